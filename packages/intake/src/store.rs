//! Record store seam and the Notion implementation
//!
//! The intake endpoint forwards each accepted submission through a
//! [`RecordStore`]. [`NotionStore`] creates one page in a Notion database per
//! submission. Every call is bounded by the configured timeout; the timer is
//! owned by the call's future and is dropped with it, so it can fire at most
//! once and never outlives the request.

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{NotionConfig, NOTION_API_VERSION};
use crate::context::RequestContext;
use crate::redact::Redacted;
use crate::submission::SignupSubmission;

/// Failure modes of a single forwarding attempt
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered with a non-2xx status
    #[error("record store rejected the request with status {status}")]
    Rejected { status: u16, details: String },

    #[error("record store did not answer within {after:?}")]
    Timeout { after: Duration },

    #[error("record store transport error: {0}")]
    Transport(String),
}

/// Destination for accepted submissions
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist one submission. Called at most once per client request.
    async fn create_record(
        &self,
        submission: &SignupSubmission,
        context: &RequestContext,
    ) -> Result<(), StoreError>;
}

/// Notion "create page" client
pub struct NotionStore {
    http: reqwest::Client,
    pages_url: Url,
    token: Redacted<String>,
    database_id: String,
    timeout: Duration,
}

impl NotionStore {
    pub fn new(config: &NotionConfig, token: Redacted<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aii-intake/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("Failed to build HTTP client")?;
        let pages_url = config
            .api_base
            .join("v1/pages")
            .wrap_err("Failed to derive Notion pages URL")?;

        debug!(
            pages_url = %pages_url,
            database_id = %config.database_id,
            timeout_ms = config.timeout_ms,
            token = %token,
            "Notion store initialized"
        );

        Ok(Self {
            http,
            pages_url,
            token,
            database_id: config.database_id.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RecordStore for NotionStore {
    async fn create_record(
        &self,
        submission: &SignupSubmission,
        context: &RequestContext,
    ) -> Result<(), StoreError> {
        let body = page_body(&self.database_id, submission, context);

        let request = self
            .http
            .post(self.pages_url.clone())
            .bearer_auth(&self.token.0)
            .header("Notion-Version", NOTION_API_VERSION)
            .json(&body);

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok((status, String::new()));
            }
            let details = response.text().await.unwrap_or_default();
            Ok::<_, reqwest::Error>((status, details))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => Err(StoreError::Timeout {
                after: self.timeout,
            }),
            Ok(Err(e)) if e.is_timeout() => Err(StoreError::Timeout {
                after: self.timeout,
            }),
            Ok(Err(e)) => Err(StoreError::Transport(e.to_string())),
            Ok(Ok((status, _))) if status.is_success() => Ok(()),
            Ok(Ok((status, details))) => {
                warn!(status = status.as_u16(), "Notion rejected page creation");
                Err(StoreError::Rejected {
                    status: status.as_u16(),
                    details,
                })
            }
        }
    }
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Notion page body for one submission
pub fn page_body(
    database_id: &str,
    submission: &SignupSubmission,
    context: &RequestContext,
) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Email": { "title": [{ "text": { "content": submission.email } }] },
            "Checkbox": { "checkbox": submission.privacy_agreed },
            "BetaAgreed": { "checkbox": submission.beta_agreed },
            "Organisation": rich_text(&submission.organisation),
            "treasure": { "checkbox": submission.manages_treasury },
            "tg": rich_text(&submission.handle),
            "Comment": rich_text(&submission.comment),
            "Timestamp": { "date": { "start": context.timestamp } },
            "IP": rich_text(&context.ip),
            "UserAgent": rich_text(&context.user_agent),
            "Country": rich_text(&context.country),
            "Referer": rich_text(&context.referer),
            "Timezone": rich_text(&context.timezone),
            "Language": rich_text(&context.language),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::AssetRange;

    fn sample() -> (SignupSubmission, RequestContext) {
        (
            SignupSubmission {
                email: "a@b.com".to_string(),
                privacy_agreed: true,
                beta_agreed: false,
                organisation: "DAO".to_string(),
                manages_treasury: true,
                asset_range: Some(AssetRange::From1MTo10M),
                handle: "@dao".to_string(),
                comment: "Treasurer: Yes, Assets: $1M-$10M".to_string(),
            },
            RequestContext {
                ip: "203.0.113.7".to_string(),
                user_agent: "curl/8.0".to_string(),
                country: "DE".to_string(),
                referer: "Direct".to_string(),
                timezone: "UTC".to_string(),
                language: "en".to_string(),
                timestamp: "2025-03-01T12:30:45.000Z".to_string(),
            },
        )
    }

    #[test]
    fn test_page_body_shape() {
        let (sub, ctx) = sample();
        let body = page_body("db123", &sub, &ctx);

        assert_eq!(body["parent"]["database_id"], "db123");
        let props = &body["properties"];
        assert_eq!(props["Email"]["title"][0]["text"]["content"], "a@b.com");
        assert_eq!(props["Checkbox"]["checkbox"], true);
        assert_eq!(props["BetaAgreed"]["checkbox"], false);
        assert_eq!(props["treasure"]["checkbox"], true);
        assert_eq!(props["Organisation"]["rich_text"][0]["text"]["content"], "DAO");
        assert_eq!(props["tg"]["rich_text"][0]["text"]["content"], "@dao");
        assert_eq!(
            props["Comment"]["rich_text"][0]["text"]["content"],
            "Treasurer: Yes, Assets: $1M-$10M"
        );
        assert_eq!(props["Timestamp"]["date"]["start"], "2025-03-01T12:30:45.000Z");
        assert_eq!(props["IP"]["rich_text"][0]["text"]["content"], "203.0.113.7");
        assert_eq!(props["Country"]["rich_text"][0]["text"]["content"], "DE");
        assert_eq!(props["Language"]["rich_text"][0]["text"]["content"], "en");
    }

    #[test]
    fn test_pages_url_from_base() {
        let config = crate::config::Config::from_lookup(|name| match name {
            "NOTION_API_BASE" => Some("http://127.0.0.1:9999".to_string()),
            _ => None,
        })
        .unwrap();
        let store = NotionStore::new(&config.notion, Redacted("t".to_string())).unwrap();
        assert_eq!(store.pages_url.as_str(), "http://127.0.0.1:9999/v1/pages");
        assert_eq!(store.timeout(), Duration::from_millis(12_000));
    }
}
