//! Integration tests for the AII bridge client
//!
//! The `gating` tests run offline: every operation is rejected before any
//! RPC call is made. The `live` tests talk to public RPC endpoints and are
//! ignored by default.
//!
//! Run with: cargo test --test integration_test -- --ignored --nocapture
//!
//! Optional environment variables:
//! - SONIC_RPC_URL (default: https://rpc.soniclabs.com)
//! - BASE_RPC_URL (default: https://mainnet.base.org)

use std::env;
use std::sync::Arc;

use alloy::primitives::{address, Address, U256};
use bridge::{
    error::Operation,
    routes::{BASE_CHAIN_ID, SONIC_CHAIN_ID},
    session::{lock_session, InFlightGuard},
    BridgeClient, BridgeDirection, BridgeError, BridgeSession, LocalWallet, RouteTable,
};

// Anvil's first well-known development key; never holds mainnet funds
const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const TEST_ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

fn routes() -> RouteTable {
    RouteTable::default()
        .with_rpc_override(bridge::ChainKey::Sonic, env::var("SONIC_RPC_URL").ok())
        .with_rpc_override(bridge::ChainKey::Base, env::var("BASE_RPC_URL").ok())
}

fn client(direction: BridgeDirection) -> BridgeClient {
    let routes = routes();
    let source = routes.route(direction).source.chain_id;
    let wallet = Arc::new(LocalWallet::new(TEST_KEY, routes.chains(), source).unwrap());
    let mut session = BridgeSession::new(routes);
    session.set_direction(direction);
    BridgeClient::new(wallet, session.into_shared())
}

// ============================================================================
// Offline gating
// ============================================================================

mod gating {
    use super::*;

    #[tokio::test]
    async fn test_quote_requires_connection() {
        let client = client(BridgeDirection::SonicToBase);
        lock_session(client.session()).set_amount("1");

        let err = client.quote().await.unwrap_err();

        assert!(matches!(err, BridgeError::NotConnected));
        assert_eq!(
            lock_session(client.session()).error(),
            Some("Quote failed: Wallet not connected")
        );
        assert!(lock_session(client.session()).in_flight().is_none());
    }

    #[tokio::test]
    async fn test_quote_on_wrong_chain() {
        let client = client(BridgeDirection::SonicToBase);
        {
            let mut s = lock_session(client.session());
            s.on_connected(TEST_ACCOUNT, Some(BASE_CHAIN_ID));
            s.set_amount("1");
        }

        let err = client.quote().await.unwrap_err();

        assert!(matches!(err, BridgeError::WrongNetwork { .. }));
        assert_eq!(
            lock_session(client.session()).error(),
            Some("Switch to Sonic before requesting a quote.")
        );
    }

    #[tokio::test]
    async fn test_bridge_requires_approval() {
        let client = client(BridgeDirection::BaseToSonic);
        {
            let mut s = lock_session(client.session());
            s.on_connected(TEST_ACCOUNT, Some(BASE_CHAIN_ID));
            s.apply_token_data(18, U256::from(10u64).pow(U256::from(19u64)), U256::ZERO);
            s.set_amount("2");
        }

        let err = client.bridge().await.unwrap_err();

        assert!(matches!(err, BridgeError::ApprovalRequired));
        assert!(lock_session(client.session()).in_flight().is_none());
    }

    #[tokio::test]
    async fn test_bridge_rejects_insufficient_balance() {
        let client = client(BridgeDirection::SonicToBase);
        {
            let mut s = lock_session(client.session());
            s.on_connected(TEST_ACCOUNT, Some(SONIC_CHAIN_ID));
            s.apply_token_data(18, U256::ZERO, U256::MAX);
            s.set_amount("1");
        }

        let err = client.bridge().await.unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientBalance));
    }

    #[tokio::test]
    async fn test_operations_do_not_overlap() {
        let client = client(BridgeDirection::SonicToBase);
        {
            let mut s = lock_session(client.session());
            s.on_connected(TEST_ACCOUNT, Some(SONIC_CHAIN_ID));
            s.apply_token_data(18, U256::MAX, U256::ZERO);
            s.set_amount("1");
        }
        let _held = InFlightGuard::acquire(client.session(), Operation::Bridge).unwrap();

        let err = client.approve().await.unwrap_err();
        assert!(matches!(err, BridgeError::Busy(Operation::Bridge)));
        assert_eq!(
            lock_session(client.session()).error(),
            Some("Another bridge transaction is already in progress.")
        );

        let err = client.quote().await.unwrap_err();
        assert!(matches!(err, BridgeError::Busy(Operation::Bridge)));
    }

    #[tokio::test]
    async fn test_load_token_data_skips_without_account() {
        let client = client(BridgeDirection::SonicToBase);
        client.load_token_data().await.unwrap();
        assert_eq!(lock_session(client.session()).token_decimals(), 18);
    }
}

// ============================================================================
// Live RPC
// ============================================================================

mod live {
    use super::*;

    #[tokio::test]
    #[ignore = "requires network access to the Sonic RPC"]
    async fn test_connect_and_load_token_data_on_sonic() {
        let client = client(BridgeDirection::SonicToBase);

        let account = client.connect().await.unwrap();
        assert_eq!(account, TEST_ACCOUNT);
        assert!(lock_session(client.session()).is_on_source_chain());

        client.load_token_data().await.unwrap();
        let s = lock_session(client.session());
        assert_eq!(s.token_decimals(), 18);
        println!("balance: {}, allowance: {}", s.token_balance(), s.allowance());
    }

    #[tokio::test]
    #[ignore = "requires network access to the Base RPC"]
    async fn test_base_oft_pulls_no_approval() {
        let client = client(BridgeDirection::BaseToSonic);
        client.connect().await.unwrap();
        // The Base OFT burns from the sender directly
        assert!(!client.approval_required().await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires network access to the Sonic RPC"]
    async fn test_switch_network_updates_session() {
        let client = client(BridgeDirection::SonicToBase);
        client.connect().await.unwrap();

        lock_session(client.session()).toggle_direction();
        client.switch_to_source_network().await.unwrap();

        let s = lock_session(client.session());
        assert_eq!(s.direction(), BridgeDirection::BaseToSonic);
        assert_eq!(s.chain_id(), Some(BASE_CHAIN_ID));
    }
}
