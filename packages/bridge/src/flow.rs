//! Wallet-level flows: connect, refresh and network switching
//!
//! These only need a [`WalletProvider`], so they run the same against a
//! browser-style wallet or the local key wallet.

use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::error::{describe_failure, BridgeError, Stage};
use crate::session::{lock_session, SharedSession};
use crate::wallet::{AddChainParams, Subscription, WalletEvent, WalletProvider};

/// Feed wallet events into the session for as long as the guard lives
pub fn attach(session: &SharedSession, wallet: &dyn WalletProvider) -> Subscription {
    let session = session.clone();
    wallet.subscribe(Arc::new(move |event: &WalletEvent| {
        lock_session(&session).handle_event(event);
    }))
}

/// Store the user-facing message for `err` and hand the error back
pub fn record_failure(session: &SharedSession, stage: Stage, err: BridgeError) -> BridgeError {
    let mut s = lock_session(session);
    let message = describe_failure(stage, &err, s.route().source.label);
    warn!(?stage, error = %err, "{}", message);
    s.set_error(message);
    err
}

/// Request account access and record the account and chain
pub async fn connect(
    session: &SharedSession,
    wallet: &dyn WalletProvider,
) -> Result<Address, BridgeError> {
    let result = async {
        let accounts = wallet.request_accounts().await?;
        let account = accounts.first().copied().ok_or(BridgeError::NotConnected)?;
        let chain_id = wallet.chain_id().await?;
        Ok::<_, BridgeError>((account, chain_id))
    }
    .await;

    match result {
        Ok((account, chain_id)) => {
            let mut s = lock_session(session);
            s.on_connected(account, Some(chain_id));
            s.clear_error();
            s.set_status("Wallet connected.");
            info!(account = %account, chain_id, "Wallet connected");
            Ok(account)
        }
        Err(e) => Err(record_failure(session, Stage::Connect, e)),
    }
}

/// Re-read accounts and chain without prompting the user
pub async fn refresh(session: &SharedSession, wallet: &dyn WalletProvider) -> Result<(), BridgeError> {
    let result = async {
        let chain_id = wallet.chain_id().await?;
        let accounts = wallet.accounts().await?;
        Ok::<_, BridgeError>((accounts.first().copied(), chain_id))
    }
    .await;

    match result {
        Ok((account, chain_id)) => {
            lock_session(session).on_refreshed(account, Some(chain_id));
            Ok(())
        }
        Err(e) => Err(record_failure(session, Stage::Connect, e)),
    }
}

/// Switch the wallet to the route's source chain, adding it when unknown
pub async fn switch_to_source_network(
    session: &SharedSession,
    wallet: &dyn WalletProvider,
) -> Result<(), BridgeError> {
    let source = lock_session(session).route().source;

    match wallet.switch_chain(source.chain_id).await {
        Ok(()) => {}
        Err(e) if e.is_unrecognized_chain() => {
            info!(chain = source.label, "Chain unknown to wallet, adding it");
            if let Err(e) = wallet.add_chain(AddChainParams::from(&source)).await {
                return Err(record_failure(session, Stage::AddNetwork, e));
            }
        }
        Err(e) => return Err(record_failure(session, Stage::SwitchNetwork, e)),
    }

    refresh(session, wallet).await
}
