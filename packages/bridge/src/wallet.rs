//! Wallet provider seam
//!
//! [`WalletProvider`] is the subset of an EIP-1193 wallet the bridge needs:
//! accounts, the active chain, network switching and change notifications.
//! Listeners are held by [`Subscription`] guards and removed when the guard
//! is dropped, so a session that goes away stops receiving events.
//!
//! [`LocalWallet`] implements the seam with a private key and one JSON-RPC
//! endpoint per known chain. Switching networks selects another endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::Address;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{BridgeError, UNRECOGNIZED_CHAIN_CODE};
use crate::routes::{ChainConfig, NativeCurrency};

/// Notifications a wallet pushes to the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    /// Raw hex chain id as reported by the wallet
    ChainChanged(String),
}

/// Parse a wallet-reported hex chain id, `None` when malformed
pub fn parse_chain_id(hex: &str) -> Option<u64> {
    let digits = hex
        .trim()
        .strip_prefix("0x")
        .or_else(|| hex.trim().strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Parameters for `wallet_addEthereumChain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddChainParams {
    pub chain_id_hex: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl From<&ChainConfig> for AddChainParams {
    fn from(chain: &ChainConfig) -> Self {
        Self {
            chain_id_hex: chain.chain_id_hex(),
            chain_name: chain.label.to_string(),
            native_currency: chain.native_currency.clone(),
            rpc_urls: chain.rpc_urls.clone(),
            block_explorer_urls: chain.block_explorer_urls.clone(),
        }
    }
}

pub type Listener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Fan-out of wallet events to registered listeners
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<Mutex<HubInner>>,
}

fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
    // A panicking listener runs outside the lock, so poisoning is not expected
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EventHub {
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    pub fn emit(&self, event: &WalletEvent) {
        let listeners: Vec<Listener> = lock(&self.inner)
            .listeners
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

/// Registration guard: the listener is removed on drop
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            lock(&hub).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask for account access (`eth_requestAccounts`)
    async fn request_accounts(&self) -> Result<Vec<Address>, BridgeError>;

    /// Accounts already authorized (`eth_accounts`)
    async fn accounts(&self) -> Result<Vec<Address>, BridgeError>;

    /// Active chain id (`eth_chainId`)
    async fn chain_id(&self) -> Result<u64, BridgeError>;

    /// `wallet_switchEthereumChain`; unknown chains fail with code 4902
    async fn switch_chain(&self, chain_id: u64) -> Result<(), BridgeError>;

    /// `wallet_addEthereumChain`
    async fn add_chain(&self, params: AddChainParams) -> Result<(), BridgeError>;

    fn subscribe(&self, listener: Listener) -> Subscription;
}

/// Signing provider built by [`LocalWallet`] with the recommended fillers
pub type SigningProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Http<Client>>,
    Http<Client>,
    Ethereum,
>;

/// Private-key wallet backed by per-chain JSON-RPC endpoints
pub struct LocalWallet {
    signer: PrivateKeySigner,
    endpoints: Mutex<HashMap<u64, String>>,
    /// One provider per chain, built on first use
    providers: Mutex<HashMap<u64, SigningProvider>>,
    active_chain: Mutex<u64>,
    hub: EventHub,
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.signer.address())
            .field("signer", &"<redacted>")
            .field("active_chain", &self.active_chain_id())
            .finish()
    }
}

impl LocalWallet {
    /// Build a wallet that knows `chains` and starts on `initial_chain`
    ///
    /// Chains not listed here must be added with [`WalletProvider::add_chain`]
    /// before they can be selected.
    pub fn new<'a>(
        private_key: &str,
        chains: impl IntoIterator<Item = &'a ChainConfig>,
        initial_chain: u64,
    ) -> Result<Self, BridgeError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|_| BridgeError::Rpc("Invalid private key".to_string()))?;

        let endpoints: HashMap<u64, String> = chains
            .into_iter()
            .map(|c| (c.chain_id, c.rpc_url().to_string()))
            .collect();
        if !endpoints.contains_key(&initial_chain) {
            return Err(BridgeError::Wallet {
                code: UNRECOGNIZED_CHAIN_CODE,
                message: format!("Unrecognized chain ID 0x{:x}", initial_chain),
            });
        }

        info!(address = %signer.address(), chain_id = initial_chain, "Local wallet initialized");

        Ok(Self {
            signer,
            endpoints: Mutex::new(endpoints),
            providers: Mutex::new(HashMap::new()),
            active_chain: Mutex::new(initial_chain),
            hub: EventHub::default(),
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Chain the wallet believes it is on, without asking the RPC
    pub fn active_chain_id(&self) -> u64 {
        *self
            .active_chain
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rpc_url(&self, chain_id: u64) -> Result<String, BridgeError> {
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&chain_id)
            .cloned()
            .ok_or(BridgeError::WalletUnavailable)
    }

    /// Signing provider for the active chain
    ///
    /// The chain is read once; callers that need the live chain id should
    /// ask this same provider so the check and the transaction share an
    /// endpoint.
    pub fn provider(&self) -> Result<SigningProvider, BridgeError> {
        let chain_id = self.active_chain_id();
        let mut providers = self
            .providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(provider) = providers.get(&chain_id) {
            return Ok(provider.clone());
        }

        let url = self.rpc_url(chain_id)?;
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(
                url.parse()
                    .map_err(|e| BridgeError::Rpc(format!("Invalid RPC URL {}: {}", url, e)))?,
            );
        debug!(chain_id, %url, "Built provider");
        providers.insert(chain_id, provider.clone());
        Ok(provider)
    }

    fn select_chain(&self, chain_id: u64) {
        let changed = {
            let mut active = self
                .active_chain
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let changed = *active != chain_id;
            *active = chain_id;
            changed
        };
        if changed {
            debug!(chain_id, "Local wallet switched chain");
            self.hub
                .emit(&WalletEvent::ChainChanged(format!("0x{:x}", chain_id)));
        }
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, BridgeError> {
        Ok(vec![self.address()])
    }

    async fn accounts(&self) -> Result<Vec<Address>, BridgeError> {
        Ok(vec![self.address()])
    }

    async fn chain_id(&self) -> Result<u64, BridgeError> {
        let provider = self.provider()?;
        provider
            .get_chain_id()
            .await
            .map_err(BridgeError::from_transport)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), BridgeError> {
        let known = self
            .endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&chain_id);
        if !known {
            return Err(BridgeError::Wallet {
                code: UNRECOGNIZED_CHAIN_CODE,
                message: format!("Unrecognized chain ID 0x{:x}", chain_id),
            });
        }
        self.select_chain(chain_id);
        Ok(())
    }

    async fn add_chain(&self, params: AddChainParams) -> Result<(), BridgeError> {
        let chain_id = parse_chain_id(&params.chain_id_hex).ok_or_else(|| BridgeError::Wallet {
            code: -32602,
            message: format!("Invalid chain id {}", params.chain_id_hex),
        })?;
        let url = params.rpc_urls.first().cloned().ok_or_else(|| BridgeError::Wallet {
            code: -32602,
            message: "rpcUrls must not be empty".to_string(),
        })?;
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(chain_id, url);
        self.providers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&chain_id);
        // Wallets switch to a freshly added chain
        self.select_chain(chain_id);
        Ok(())
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.hub.subscribe(listener)
    }
}
