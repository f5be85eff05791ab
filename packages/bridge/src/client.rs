//! Contract-level bridge operations
//!
//! [`BridgeClient`] drives token loading, quoting, approval and the OFT
//! `send` against the source chain through a [`LocalWallet`]. Each mutating
//! operation claims the session's in-flight slot for its whole duration and
//! records a user-facing message on success or failure.

use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{PendingTransactionError, Provider};
use tracing::{debug, info};

use crate::contracts::{MessagingFee, OFTAdapter, ERC20};
use crate::error::{BridgeError, Operation, Stage};
use crate::flow::{self, record_failure};
use crate::session::{lock_session, InFlightGuard, SharedSession};
use crate::wallet::{LocalWallet, SigningProvider, Subscription};

/// Outcome of a confirmed bridge transaction
#[derive(Debug, Clone)]
pub struct BridgeReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub native_fee: U256,
    pub explorer_url: Option<String>,
    pub layerzero_scan_url: String,
}

pub struct BridgeClient {
    wallet: Arc<LocalWallet>,
    session: SharedSession,
    _events: Subscription,
}

impl BridgeClient {
    /// Wire `session` to the wallet's events for the lifetime of the client
    pub fn new(wallet: Arc<LocalWallet>, session: SharedSession) -> Self {
        let events = flow::attach(&session, wallet.as_ref());
        Self {
            wallet,
            session,
            _events: events,
        }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    pub async fn connect(&self) -> Result<Address, BridgeError> {
        flow::connect(&self.session, self.wallet.as_ref()).await
    }

    pub async fn switch_to_source_network(&self) -> Result<(), BridgeError> {
        flow::switch_to_source_network(&self.session, self.wallet.as_ref()).await
    }

    /// Token contract, owner and spender for the current route
    fn token_context(&self) -> Option<(Address, Address, Address)> {
        let s = lock_session(&self.session);
        let source = s.route().source;
        Some((source.token_address?, s.account()?, source.oapp_address))
    }

    /// Load decimals, balance and allowance of the source token concurrently
    ///
    /// Results are dropped if the direction or account changed meanwhile.
    pub async fn load_token_data(&self) -> Result<(), BridgeError> {
        let Some((token, owner, spender)) = self.token_context() else {
            return Ok(());
        };
        let direction = lock_session(&self.session).direction();

        let result = async {
            let provider = self.wallet.provider()?;
            let erc20 = ERC20::new(token, &provider);
            tokio::try_join!(
                async {
                    erc20
                        .decimals()
                        .call()
                        .await
                        .map(|r| r._0)
                        .map_err(BridgeError::from_contract)
                },
                async {
                    erc20
                        .balanceOf(owner)
                        .call()
                        .await
                        .map(|r| r._0)
                        .map_err(BridgeError::from_contract)
                },
                async {
                    erc20
                        .allowance(owner, spender)
                        .call()
                        .await
                        .map(|r| r._0)
                        .map_err(BridgeError::from_contract)
                }
            )
        }
        .await;

        match result {
            Ok((decimals, balance, allowance)) => {
                let mut s = lock_session(&self.session);
                if s.direction() == direction && s.account() == Some(owner) {
                    debug!(decimals, %balance, %allowance, "Token data loaded");
                    s.apply_token_data(decimals, balance, allowance);
                }
                Ok(())
            }
            Err(e) => Err(record_failure(&self.session, Stage::LoadTokenData, e)),
        }
    }

    /// Re-read the allowance granted to the source OApp
    pub async fn refresh_allowance(&self) -> Result<U256, BridgeError> {
        let Some((token, owner, spender)) = self.token_context() else {
            return Ok(lock_session(&self.session).allowance());
        };

        let result = async {
            let provider = self.wallet.provider()?;
            ERC20::new(token, &provider)
                .allowance(owner, spender)
                .call()
                .await
                .map(|r| r._0)
                .map_err(BridgeError::from_contract)
        }
        .await;

        match result {
            Ok(allowance) => {
                lock_session(&self.session).set_allowance(allowance);
                Ok(allowance)
            }
            Err(e) => Err(record_failure(&self.session, Stage::RefreshAllowance, e)),
        }
    }

    /// Whether the source OApp pulls tokens with `transferFrom`
    pub async fn approval_required(&self) -> Result<bool, BridgeError> {
        let oapp = lock_session(&self.session).route().source.oapp_address;
        let provider = self.wallet.provider()?;
        OFTAdapter::new(oapp, &provider)
            .approvalRequired()
            .call()
            .await
            .map(|r| r._0)
            .map_err(BridgeError::from_contract)
    }

    /// Ask the source OApp for the LayerZero messaging fee
    pub async fn quote(&self) -> Result<MessagingFee, BridgeError> {
        let (_guard, (param, oapp)) =
            InFlightGuard::acquire_checked(&self.session, Operation::Quote, |s| {
                s.check_quote()?;
                let param = s.build_send_param()?;
                s.clear_error();
                s.set_status("Requesting fee quote...");
                Ok((param, s.route().source.oapp_address))
            })
            .map_err(|e| record_failure(&self.session, Stage::Quote, e))?;

        let result = async {
            let provider = self.wallet.provider()?;
            OFTAdapter::new(oapp, &provider)
                .quoteSend(param, false)
                .call()
                .await
                .map(|r| r.fee)
                .map_err(BridgeError::from_contract)
        }
        .await;

        match result {
            Ok(fee) => {
                let mut s = lock_session(&self.session);
                // A chain change while waiting makes the quote stale
                if s.is_on_source_chain() {
                    s.set_quote(fee.clone());
                }
                s.set_status("Quote received.");
                info!(native_fee = %fee.nativeFee, lz_token_fee = %fee.lzTokenFee, "Quote received");
                Ok(fee)
            }
            Err(e) => {
                let err = record_failure(&self.session, Stage::Quote, e);
                lock_session(&self.session).clear_quote();
                Err(err)
            }
        }
    }

    /// Check `provider` is still on `expected` right before submitting
    async fn ensure_live_chain(
        &self,
        provider: &SigningProvider,
        expected: u64,
    ) -> Result<(), BridgeError> {
        let live = provider
            .get_chain_id()
            .await
            .map_err(BridgeError::from_transport)?;
        lock_session(&self.session).set_chain_id(Some(live));
        if live != expected {
            return Err(BridgeError::NetworkChanged {
                expected,
                actual: live,
            });
        }
        Ok(())
    }

    /// Approve the source OApp to spend exactly the entered amount
    pub async fn approve(&self) -> Result<TxHash, BridgeError> {
        let (_guard, (token, spender, amount, chain_id)) =
            InFlightGuard::acquire_checked(&self.session, Operation::Approve, |s| {
                s.check_approve()?;
                let source = s.route().source;
                let token = source
                    .token_address
                    .ok_or(BridgeError::ApprovalUnavailable(source.label))?;
                s.clear_error();
                s.set_status("Submitting approval...");
                Ok((token, source.oapp_address, s.amount_ld(), source.chain_id))
            })
            .map_err(|e| record_failure(&self.session, Stage::Approve, e))?;

        let result = async {
            let provider = self.wallet.provider()?;
            self.ensure_live_chain(&provider, chain_id).await?;
            let erc20 = ERC20::new(token, &provider);

            let pending = erc20
                .approve(spender, amount)
                .send()
                .await
                .map_err(BridgeError::from_contract)?;
            let tx_hash = *pending.tx_hash();
            info!(tx_hash = %tx_hash, %amount, "Approval transaction sent");

            let receipt = match pending.get_receipt().await {
                Ok(receipt) => receipt,
                Err(e) => return Err(self.receipt_error(chain_id, e)),
            };
            if !receipt.status() {
                return Err(BridgeError::ReceiptFailed {
                    tx_hash: tx_hash.to_string(),
                });
            }
            Ok(tx_hash)
        }
        .await;

        match result {
            Ok(tx_hash) => {
                // Failure here is recorded but does not undo the approval
                let _ = self.refresh_allowance().await;
                lock_session(&self.session).set_status("Approval confirmed.");
                info!(tx_hash = %tx_hash, "Approval confirmed");
                Ok(tx_hash)
            }
            Err(e) => Err(record_failure(&self.session, Stage::Approve, e)),
        }
    }

    /// A lost receipt while the wallet moved chains is a network change
    fn receipt_error(&self, expected: u64, err: PendingTransactionError) -> BridgeError {
        match lock_session(&self.session).chain_id() {
            Some(actual) if actual != expected => BridgeError::NetworkChanged { expected, actual },
            _ => BridgeError::from_pending(err),
        }
    }

    /// Quote if needed, then call `send` with the native fee attached
    pub async fn bridge(&self) -> Result<BridgeReceipt, BridgeError> {
        let (_guard, (param, stored_quote, account, route)) =
            InFlightGuard::acquire_checked(&self.session, Operation::Bridge, |s| {
                s.check_bridge()?;
                let param = s.build_send_param()?;
                let account = s.account().ok_or(BridgeError::NotConnected)?;
                s.clear_error();
                s.set_status("Preparing bridge transaction...");
                Ok((param, s.quote().cloned(), account, s.route()))
            })
            .map_err(|e| record_failure(&self.session, Stage::Bridge, e))?;
        let source = &route.source;

        let result = async {
            let provider = self.wallet.provider()?;
            let oft = OFTAdapter::new(source.oapp_address, &provider);

            let fee = match stored_quote {
                Some(fee) => fee,
                None => oft
                    .quoteSend(param.clone(), false)
                    .call()
                    .await
                    .map(|r| r.fee)
                    .map_err(BridgeError::from_contract)?,
            };

            self.ensure_live_chain(&provider, source.chain_id)
                .await
                .map_err(|e| match e {
                    BridgeError::NetworkChanged { actual, .. } => BridgeError::WrongNetwork {
                        label: source.label,
                        action: "to submit the bridge transaction",
                        expected: source.chain_id,
                        actual: Some(actual),
                    },
                    other => other,
                })?;

            lock_session(&self.session)
                .set_status(format!("Sending transaction on {}...", source.label));
            let pending = oft
                .send(param, fee.clone(), account)
                .value(fee.nativeFee)
                .send()
                .await
                .map_err(BridgeError::from_contract)?;
            let tx_hash = *pending.tx_hash();
            info!(tx_hash = %tx_hash, native_fee = %fee.nativeFee, "Bridge transaction sent");

            lock_session(&self.session).set_status("Waiting for confirmation...");
            let receipt = match pending.get_receipt().await {
                Ok(receipt) => receipt,
                Err(e) => return Err(self.receipt_error(source.chain_id, e)),
            };
            if !receipt.status() {
                return Err(BridgeError::ReceiptFailed {
                    tx_hash: tx_hash.to_string(),
                });
            }
            Ok((tx_hash, receipt.block_number, fee))
        }
        .await;

        match result {
            Ok((tx_hash, block_number, fee)) => {
                lock_session(&self.session).set_quote(fee.clone());
                let _ = self.refresh_allowance().await;
                lock_session(&self.session).set_status(
                    "Bridge transaction submitted. Track delivery on LayerZero explorer.",
                );
                info!(tx_hash = %tx_hash, block = ?block_number, "Bridge transaction confirmed");
                Ok(BridgeReceipt {
                    tx_hash,
                    block_number,
                    native_fee: fee.nativeFee,
                    explorer_url: route.explorer_tx_url(&tx_hash.to_string()),
                    layerzero_scan_url: route.layerzero_scan_url(),
                })
            }
            Err(e) => Err(record_failure(&self.session, Stage::Bridge, e)),
        }
    }
}
