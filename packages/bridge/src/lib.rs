//! AII Bridge - Library interface
//!
//! Orchestrates LayerZero OFT transfers of the AII token between Sonic and
//! Base: route selection, amount and slippage math, wallet connection and
//! network switching, fee quotes, approvals and the final `send`.

pub mod amounts;
pub mod client;
pub mod config;
pub mod contracts;
pub mod error;
pub mod flow;
pub mod routes;
pub mod session;
pub mod wallet;

pub use client::{BridgeClient, BridgeReceipt};
pub use config::BridgeConfig;
pub use error::{describe_failure, BridgeError, Operation, Stage};
pub use routes::{BridgeDirection, BridgeRoute, ChainConfig, ChainKey, RouteTable};
pub use session::{BridgeSession, SharedSession};
pub use wallet::{LocalWallet, WalletEvent, WalletProvider};
