//! Intake service configuration
//!
//! Every setting that historically had more than one accepted environment
//! variable name is described by an ordered list below. The lists are
//! resolved exactly once, in [`Config::load`], into a single [`Config`];
//! nothing else in the service reads the environment.

use eyre::{eyre, Result, WrapErr};
use std::env;
use std::path::Path;
use url::Url;

use crate::redact::Redacted;

/// Notion integration token, first non-empty name wins.
pub const NOTION_TOKEN_VARS: &[&str] = &["notion_api", "NOTION_API", "NOTION_TOKEN"];
/// Target database (collection) identifier.
pub const NOTION_DB_VARS: &[&str] = &["notion_db", "NOTION_DB"];
pub const NOTION_TIMEOUT_VARS: &[&str] = &["NOTION_TIMEOUT_MS"];
pub const NOTION_API_BASE_VARS: &[&str] = &["NOTION_API_BASE"];
pub const BIND_ADDRESS_VARS: &[&str] = &["INTAKE_BIND_ADDRESS"];
pub const PORT_VARS: &[&str] = &["INTAKE_PORT", "PORT"];
pub const TIMEZONE_VARS: &[&str] = &["INTAKE_TIMEZONE", "TZ"];

pub const DEFAULT_NOTION_DB: &str = "19727ba82ccc8017b4d8f2825a4d4895";
pub const DEFAULT_NOTION_TIMEOUT_MS: u64 = 12_000;
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
/// Fixed `Notion-Version` header sent with every request.
pub const NOTION_API_VERSION: &str = "2022-06-28";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Intake service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub notion: NotionConfig,
    pub server: ServerConfig,
}

/// Outbound Notion API settings
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Bearer credential. `None` keeps the service up but every submission
    /// is answered with a configuration error.
    pub token: Option<Redacted<String>>,
    pub database_id: String,
    pub api_base: Url,
    pub timeout_ms: u64,
}

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Reported as the `Timezone` attribute of every record
    pub timezone: String,
}

/// Resolve an ordered list of variable names: the first name holding a
/// non-blank value wins.
pub fn first_set<F>(names: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

impl Config {
    /// Load configuration from the process environment.
    /// A `.env` file in the working directory is applied first when present.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path, then read the environment
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
            tracing::debug!("Loaded .env from {}", path);
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = first_set(NOTION_TOKEN_VARS, &lookup).map(Redacted);

        let database_id =
            first_set(NOTION_DB_VARS, &lookup).unwrap_or_else(|| DEFAULT_NOTION_DB.to_string());

        let timeout_ms = first_set(NOTION_TIMEOUT_VARS, &lookup)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_NOTION_TIMEOUT_MS);

        let api_base_raw = first_set(NOTION_API_BASE_VARS, &lookup)
            .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string());
        let api_base = Url::parse(&api_base_raw)
            .wrap_err_with(|| format!("NOTION_API_BASE is not a valid URL: {}", api_base_raw))?;
        if api_base.cannot_be_a_base() {
            return Err(eyre!("NOTION_API_BASE must be an absolute http(s) URL"));
        }

        let port = match first_set(PORT_VARS, &lookup) {
            Some(raw) => raw
                .parse::<u16>()
                .wrap_err_with(|| format!("INTAKE_PORT must be a valid port, got {}", raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            notion: NotionConfig {
                token,
                database_id,
                api_base,
                timeout_ms,
            },
            server: ServerConfig {
                bind_address: first_set(BIND_ADDRESS_VARS, &lookup)
                    .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
                port,
                timezone: first_set(TIMEZONE_VARS, &lookup)
                    .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            },
        })
    }
}
