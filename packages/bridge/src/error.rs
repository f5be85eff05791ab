//! Bridge errors and the user-facing messages built from them

use std::fmt;

use alloy::contract::Error as ContractError;
use alloy::providers::PendingTransactionError;
use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

/// EIP-1193 / MetaMask code for "this chain has not been added"
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;
/// EIP-1193 code for a request the user rejected
pub const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC code nodes return for a reverted `eth_call` or gas estimate
pub const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("No wallet available. Set BRIDGE_PRIVATE_KEY or connect a wallet provider.")]
    WalletUnavailable,

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Switch to {label} {action}.")]
    WrongNetwork {
        label: &'static str,
        action: &'static str,
        expected: u64,
        actual: Option<u64>,
    },

    /// The wallet's chain moved while a transaction was being prepared
    #[error("wallet switched networks mid-transaction (expected chain {expected}, now {actual})")]
    NetworkChanged { expected: u64, actual: u64 },

    #[error("Recipient address is invalid.")]
    InvalidRecipient,

    #[error("Configure the token contract for {0} before bridging this direction.")]
    TokenNotConfigured(&'static str),

    #[error("Approval unavailable: configure the token contract for {0}.")]
    ApprovalUnavailable(&'static str),

    #[error("Enter an amount greater than zero.")]
    ZeroAmount,

    #[error("Insufficient balance.")]
    InsufficientBalance,

    #[error("Approve the bridge to spend your tokens first.")]
    ApprovalRequired,

    #[error("Another {0} is already in progress.")]
    Busy(Operation),

    /// Node reported an execution revert; holds the node's message
    #[error("{0}")]
    Reverted(String),

    #[error("transaction {tx_hash} reverted")]
    ReceiptFailed { tx_hash: String },

    /// Error object returned by the wallet itself
    #[error("{message} (code {code})")]
    Wallet { code: i64, message: String },

    #[error("{0}")]
    Rpc(String),
}

impl BridgeError {
    /// Classify a JSON-RPC failure, separating execution reverts
    ///
    /// A revert is an error response with code 3, revert data attached, or
    /// a node message that names the revert.
    pub fn from_transport(err: RpcError<TransportErrorKind>) -> Self {
        match err.as_error_resp() {
            Some(payload)
                if payload.code == EXECUTION_REVERTED_CODE
                    || payload.as_revert_data().is_some()
                    || payload.message.contains("execution reverted") =>
            {
                Self::Reverted(payload.message.to_string())
            }
            _ => Self::Rpc(err.to_string()),
        }
    }

    pub fn from_contract(err: ContractError) -> Self {
        match err {
            ContractError::TransportError(e) => Self::from_transport(e),
            ContractError::PendingTransactionError(e) => Self::from_pending(e),
            other => Self::Rpc(other.to_string()),
        }
    }

    pub fn from_pending(err: PendingTransactionError) -> Self {
        match err {
            PendingTransactionError::TransportError(e) => Self::from_transport(e),
            other => Self::Rpc(other.to_string()),
        }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        matches!(self, Self::Wallet { code, .. } if *code == UNRECOGNIZED_CHAIN_CODE)
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted(_) | Self::ReceiptFailed { .. })
    }
}

/// Mutating operations that hold the session's in-flight slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Quote,
    Approve,
    Bridge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quote => "quote",
            Self::Approve => "approval",
            Self::Bridge => "bridge transaction",
        })
    }
}

/// Step of the bridge flow an error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    LoadTokenData,
    SwitchNetwork,
    AddNetwork,
    RefreshAllowance,
    Quote,
    Approve,
    Bridge,
}

impl Stage {
    fn prefix(self) -> &'static str {
        match self {
            Self::Connect => "Connection failed",
            Self::LoadTokenData => "Failed to load token data",
            Self::SwitchNetwork => "Failed to switch network",
            Self::AddNetwork => "Failed to add network",
            Self::RefreshAllowance => "Unable to refresh allowance",
            Self::Quote => "Quote failed",
            Self::Approve => "Approval failed",
            Self::Bridge => "Bridge failed",
        }
    }
}

/// Turn a failure into the message shown to the user
///
/// Reverts and mid-flight network changes get targeted hints; gating errors
/// are shown verbatim; everything else is prefixed with the stage.
pub fn describe_failure(stage: Stage, err: &BridgeError, source_label: &str) -> String {
    match (stage, err) {
        (Stage::Quote, e) if e.is_revert() => "Quote failed: LayerZero endpoint rejected the request. \
             Confirm the bridge configuration and try a smaller amount."
            .to_string(),
        (Stage::Bridge, e) if e.is_revert() => format!(
            "Bridge failed: transaction reverted on the {} contract. \
             Recheck fee quote, allowance, and LayerZero endpoint settings.",
            source_label
        ),
        (Stage::Approve, BridgeError::NetworkChanged { .. }) => format!(
            "Approval failed: wallet switched networks mid-transaction. \
             Reconnect on {} and try again.",
            source_label
        ),
        (
            _,
            BridgeError::WrongNetwork { .. }
            | BridgeError::InvalidRecipient
            | BridgeError::TokenNotConfigured(_)
            | BridgeError::ApprovalUnavailable(_)
            | BridgeError::ZeroAmount
            | BridgeError::InsufficientBalance
            | BridgeError::ApprovalRequired
            | BridgeError::Busy(_)
            | BridgeError::WalletUnavailable,
        ) => err.to_string(),
        (Stage::AddNetwork, e) => format!("Failed to add {} network: {}", source_label, e),
        (stage, e) => format!("{}: {}", stage.prefix(), e),
    }
}
