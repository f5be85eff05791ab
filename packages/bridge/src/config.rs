//! Bridge CLI configuration, read from the environment (and `.env`)

use std::env;
use std::fmt;
use std::path::Path;

use eyre::{Result, WrapErr};
use url::Url;

use crate::routes::{ChainKey, RouteTable};

/// Signing key for the local wallet, first non-empty name wins.
pub const PRIVATE_KEY_VARS: &[&str] = &["BRIDGE_PRIVATE_KEY", "PRIVATE_KEY"];
pub const SONIC_RPC_VARS: &[&str] = &["SONIC_RPC_URL"];
pub const BASE_RPC_VARS: &[&str] = &["BASE_RPC_URL"];

#[derive(Clone, Default)]
pub struct BridgeConfig {
    pub private_key: Option<String>,
    pub sonic_rpc_url: Option<String>,
    pub base_rpc_url: Option<String>,
}

/// Custom Debug that redacts the private key to prevent accidental log leakage.
impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("sonic_rpc_url", &self.sonic_rpc_url)
            .field("base_rpc_url", &self.base_rpc_url)
            .finish()
    }
}

fn first_set<F>(names: &[&str], lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn checked_url(name: &str, raw: Option<String>) -> Result<Option<String>> {
    match raw {
        Some(raw) => {
            Url::parse(&raw).wrap_err_with(|| format!("{} is not a valid URL: {}", name, raw))?;
            Ok(Some(raw))
        }
        None => Ok(None),
    }
}

impl BridgeConfig {
    /// Load from the process environment, applying `.env` first when present
    pub fn load() -> Result<Self> {
        let path = ".env";
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
            tracing::debug!("Loaded .env from {}", path);
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            private_key: first_set(PRIVATE_KEY_VARS, &lookup),
            sonic_rpc_url: checked_url("SONIC_RPC_URL", first_set(SONIC_RPC_VARS, &lookup))?,
            base_rpc_url: checked_url("BASE_RPC_URL", first_set(BASE_RPC_VARS, &lookup))?,
        })
    }

    /// Default routes with any RPC overrides applied
    pub fn route_table(&self) -> RouteTable {
        RouteTable::default()
            .with_rpc_override(ChainKey::Sonic, self.sonic_rpc_url.clone())
            .with_rpc_override(ChainKey::Base, self.base_rpc_url.clone())
    }
}
