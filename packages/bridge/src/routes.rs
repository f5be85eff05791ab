//! Chain and route definitions for the AII OFT bridge
//!
//! Two chains are wired up: Sonic, where an OFT adapter locks the native AII
//! token, and Base, where the OFT contract is itself the token.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{address, Address};

pub const SONIC_CHAIN_ID: u64 = 146;
pub const BASE_CHAIN_ID: u64 = 8453;

pub const SONIC_EID: u32 = 30332;
pub const BASE_EID: u32 = 30184;

pub const SONIC_OFT_ADAPTER: Address = address!("4Fef28A829DCFF8741de4460a9d26a733b50D5fa");
pub const SONIC_TOKEN: Address = address!("e13de1217939A6a7A2f93732685af892c84E2A7a");
pub const BASE_OFT: Address = address!("6E1c500EFd26D23a35408C63f315EaEDBCF4498F");

pub const SONIC_RPC_URL: &str = "https://rpc.soniclabs.com";
pub const BASE_RPC_URL: &str = "https://mainnet.base.org";

pub const TOKEN_SYMBOL: &str = "AII";
pub const LAYERZERO_SCAN_BASE: &str = "https://mainnet.layerzeroscan.com";

/// The two chains the bridge connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKey {
    Sonic,
    Base,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Everything needed to talk to one side of the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub key: ChainKey,
    pub label: &'static str,
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    /// OFT (or OFT adapter) contract that `quoteSend`/`send` are called on
    pub oapp_address: Address,
    /// ERC20 that is debited on this chain, `None` when not yet deployed
    pub token_address: Option<Address>,
    pub eid: u32,
}

impl ChainConfig {
    pub fn sonic() -> Self {
        Self {
            key: ChainKey::Sonic,
            label: "Sonic",
            chain_id: SONIC_CHAIN_ID,
            rpc_urls: vec![SONIC_RPC_URL.to_string()],
            block_explorer_urls: vec!["https://explorer.soniclabs.com".to_string()],
            native_currency: NativeCurrency {
                name: "Sonic",
                symbol: "S",
                decimals: 18,
            },
            oapp_address: SONIC_OFT_ADAPTER,
            token_address: Some(SONIC_TOKEN),
            eid: SONIC_EID,
        }
    }

    pub fn base() -> Self {
        Self {
            key: ChainKey::Base,
            label: "Base",
            chain_id: BASE_CHAIN_ID,
            rpc_urls: vec![BASE_RPC_URL.to_string()],
            block_explorer_urls: vec!["https://basescan.org".to_string()],
            native_currency: NativeCurrency {
                name: "Ether",
                symbol: "ETH",
                decimals: 18,
            },
            oapp_address: BASE_OFT,
            token_address: Some(BASE_OFT),
            eid: BASE_EID,
        }
    }

    /// Chain id as the `0x`-prefixed lowercase hex wallets expect
    pub fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// Primary RPC endpoint
    pub fn rpc_url(&self) -> &str {
        self.rpc_urls.first().map(String::as_str).unwrap_or_default()
    }

    /// Put `url` in front of the default endpoints
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.rpc_urls.retain(|u| u != &url);
        self.rpc_urls.insert(0, url);
        self
    }
}

/// Which way tokens move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BridgeDirection {
    #[default]
    SonicToBase,
    BaseToSonic,
}

impl BridgeDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::SonicToBase => Self::BaseToSonic,
            Self::BaseToSonic => Self::SonicToBase,
        }
    }

    pub fn source(self) -> ChainKey {
        match self {
            Self::SonicToBase => ChainKey::Sonic,
            Self::BaseToSonic => ChainKey::Base,
        }
    }

    pub fn destination(self) -> ChainKey {
        self.toggled().source()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SonicToBase => "sonic-to-base",
            Self::BaseToSonic => "base-to-sonic",
        }
    }
}

impl fmt::Display for BridgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BridgeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sonic-to-base" | "sonictobase" | "sonic" => Ok(Self::SonicToBase),
            "base-to-sonic" | "basetosonic" | "base" => Ok(Self::BaseToSonic),
            other => Err(format!(
                "unknown direction '{}', expected sonic-to-base or base-to-sonic",
                other
            )),
        }
    }
}

/// Source and destination of one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRoute {
    pub direction: BridgeDirection,
    pub source: ChainConfig,
    pub destination: ChainConfig,
}

impl BridgeRoute {
    /// LayerZero endpoint id of the destination chain
    pub fn dst_eid(&self) -> u32 {
        self.destination.eid
    }

    /// LayerZero scan page for the source OApp
    pub fn layerzero_scan_url(&self) -> String {
        format!(
            "{}/address/{}",
            LAYERZERO_SCAN_BASE, self.source.oapp_address
        )
    }

    /// Explorer link for a transaction on the source chain
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        self.source
            .block_explorer_urls
            .first()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }
}

/// Both chain configs, with any RPC overrides applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    sonic: ChainConfig,
    base: ChainConfig,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            sonic: ChainConfig::sonic(),
            base: ChainConfig::base(),
        }
    }
}

impl RouteTable {
    pub fn with_rpc_override(mut self, key: ChainKey, url: Option<String>) -> Self {
        if let Some(url) = url {
            let chain = match key {
                ChainKey::Sonic => &mut self.sonic,
                ChainKey::Base => &mut self.base,
            };
            *chain = chain.clone().with_rpc_url(url);
        }
        self
    }

    pub fn chain(&self, key: ChainKey) -> &ChainConfig {
        match key {
            ChainKey::Sonic => &self.sonic,
            ChainKey::Base => &self.base,
        }
    }

    pub fn chains(&self) -> [&ChainConfig; 2] {
        [&self.sonic, &self.base]
    }

    pub fn by_chain_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains().into_iter().find(|c| c.chain_id == chain_id)
    }

    pub fn route(&self, direction: BridgeDirection) -> BridgeRoute {
        BridgeRoute {
            direction,
            source: self.chain(direction.source()).clone(),
            destination: self.chain(direction.destination()).clone(),
        }
    }
}
