//! Request metadata captured alongside each submission

use axum::http::HeaderMap;
use chrono::{DateTime, SecondsFormat, Utc};

/// Metadata attached to every forwarded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub referer: String,
    pub timezone: String,
    pub language: String,
    /// RFC 3339, UTC, millisecond precision
    pub timestamp: String,
}

const UNKNOWN: &str = "Unknown";

/// Non-empty UTF-8 value of a header, if any
fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap, timezone: &str) -> Self {
        Self::from_headers_at(headers, timezone, Utc::now())
    }

    pub fn from_headers_at(headers: &HeaderMap, timezone: &str, now: DateTime<Utc>) -> Self {
        // Edge proxy header first, then the left-most forwarded hop
        let ip = header(headers, "cf-connecting-ip")
            .or_else(|| {
                header(headers, "x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            })
            .or_else(|| header(headers, "x-real-ip"))
            .unwrap_or(UNKNOWN);

        Self {
            ip: ip.to_string(),
            user_agent: header(headers, "user-agent").unwrap_or(UNKNOWN).to_string(),
            country: header(headers, "cf-ipcountry").unwrap_or(UNKNOWN).to_string(),
            referer: header(headers, "referer").unwrap_or("Direct").to_string(),
            timezone: timezone.to_string(),
            language: header(headers, "accept-language")
                .unwrap_or(UNKNOWN)
                .to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}
