//! Bridge session state
//!
//! Holds what the bridge page keeps in memory: direction, connected account,
//! active chain, form inputs, token data and the last quote. Every flag the
//! UI gates on is derived here from that state, never stored.

use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::amounts::{self, DEFAULT_SLIPPAGE_PERCENT, DEFAULT_TOKEN_DECIMALS};
use crate::contracts::{MessagingFee, SendParam};
use crate::error::{BridgeError, Operation};
use crate::routes::{BridgeDirection, BridgeRoute, RouteTable};
use crate::wallet::{parse_chain_id, WalletEvent};

#[derive(Debug, Clone)]
pub struct BridgeSession {
    routes: RouteTable,
    direction: BridgeDirection,
    account: Option<Address>,
    chain_id: Option<u64>,
    amount: String,
    recipient: String,
    slippage: u8,
    token_decimals: u8,
    token_balance: U256,
    allowance: U256,
    quote: Option<MessagingFee>,
    in_flight: Option<Operation>,
    status: Option<String>,
    error: Option<String>,
}

impl BridgeSession {
    pub fn new(routes: RouteTable) -> Self {
        Self {
            routes,
            direction: BridgeDirection::default(),
            account: None,
            chain_id: None,
            amount: String::new(),
            recipient: String::new(),
            slippage: DEFAULT_SLIPPAGE_PERCENT,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            token_balance: U256::ZERO,
            allowance: U256::ZERO,
            quote: None,
            in_flight: None,
            status: None,
            error: None,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn direction(&self) -> BridgeDirection {
        self.direction
    }

    pub fn route(&self) -> BridgeRoute {
        self.routes.route(self.direction)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn slippage(&self) -> u8 {
        self.slippage
    }

    pub fn token_decimals(&self) -> u8 {
        self.token_decimals
    }

    pub fn token_balance(&self) -> U256 {
        self.token_balance
    }

    pub fn allowance(&self) -> U256 {
        self.allowance
    }

    pub fn quote(&self) -> Option<&MessagingFee> {
        self.quote.as_ref()
    }

    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Changing the amount invalidates the quote
    pub fn set_amount(&mut self, amount: impl Into<String>) {
        self.amount = amount.into();
        self.quote = None;
    }

    pub fn set_recipient(&mut self, recipient: impl Into<String>) {
        self.recipient = recipient.into();
        self.quote = None;
    }

    pub fn set_slippage(&mut self, percent: f64) {
        self.slippage = amounts::normalize_slippage(percent);
        self.quote = None;
    }

    /// Flip the direction and drop everything tied to the old source chain
    pub fn toggle_direction(&mut self) {
        self.set_direction(self.direction.toggled());
    }

    pub fn set_direction(&mut self, direction: BridgeDirection) {
        if direction == self.direction {
            return;
        }
        self.direction = direction;
        self.quote = None;
        self.status = None;
        self.error = None;
        self.allowance = U256::ZERO;
        self.token_balance = U256::ZERO;
        self.token_decimals = DEFAULT_TOKEN_DECIMALS;
    }

    // ------------------------------------------------------------------
    // Wallet state
    // ------------------------------------------------------------------

    /// Record an explicit connection; the recipient is reset to the account
    pub fn on_connected(&mut self, account: Address, chain_id: Option<u64>) {
        self.account = Some(account);
        self.chain_id = chain_id;
        self.recipient = account.to_checksum(None);
    }

    /// Record a silent re-read of the wallet; a typed recipient is kept
    pub fn on_refreshed(&mut self, account: Option<Address>, chain_id: Option<u64>) {
        self.chain_id = chain_id;
        match account {
            None => self.account = None,
            Some(account) => {
                self.account = Some(account);
                if self.recipient.trim().is_empty() {
                    self.recipient = account.to_checksum(None);
                }
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.account = None;
        self.token_balance = U256::ZERO;
        self.allowance = U256::ZERO;
        self.quote = None;
    }

    pub fn set_chain_id(&mut self, chain_id: Option<u64>) {
        self.chain_id = chain_id;
    }

    pub fn handle_event(&mut self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    debug!("Wallet disconnected");
                    self.disconnect();
                }
                Some(account) => {
                    debug!(account = %account, "Wallet account changed");
                    // Token data belongs to the previous owner until reloaded
                    if self.account != Some(*account) {
                        self.token_balance = U256::ZERO;
                        self.allowance = U256::ZERO;
                    }
                    self.account = Some(*account);
                    self.recipient = account.to_checksum(None);
                    self.quote = None;
                }
            },
            WalletEvent::ChainChanged(hex) => {
                self.chain_id = parse_chain_id(hex);
                debug!(chain = %hex, parsed = ?self.chain_id, "Wallet chain changed");
                self.quote = None;
            }
        }
    }

    pub fn apply_token_data(&mut self, decimals: u8, balance: U256, allowance: U256) {
        self.token_decimals = decimals;
        self.token_balance = balance;
        self.allowance = allowance;
    }

    pub fn set_allowance(&mut self, allowance: U256) {
        self.allowance = allowance;
    }

    pub fn set_quote(&mut self, fee: MessagingFee) {
        self.quote = Some(fee);
    }

    pub fn clear_quote(&mut self) {
        self.quote = None;
    }

    /// Status and error are independent; a new status keeps an earlier error
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn clear_messages(&mut self) {
        self.status = None;
        self.error = None;
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    pub fn amount_ld(&self) -> U256 {
        amounts::amount_ld(&self.amount, self.token_decimals)
    }

    pub fn min_amount_ld(&self) -> U256 {
        amounts::min_amount_ld(self.amount_ld(), self.slippage)
    }

    pub fn is_token_configured(&self) -> bool {
        self.route().source.token_address.is_some()
    }

    /// A token contract is only usable with a connected account
    fn has_token_contract(&self) -> bool {
        self.account.is_some() && self.is_token_configured()
    }

    pub fn needs_approval(&self) -> bool {
        self.has_token_contract() && amounts::needs_approval(self.amount_ld(), self.allowance)
    }

    /// Without a token contract there is nothing to check against
    pub fn has_sufficient_balance(&self) -> bool {
        !self.has_token_contract() || self.amount_ld() <= self.token_balance
    }

    pub fn is_recipient_valid(&self) -> bool {
        amounts::is_recipient_valid(&self.recipient)
    }

    pub fn is_on_source_chain(&self) -> bool {
        self.chain_id == Some(self.route().source.chain_id)
    }

    pub fn can_quote(&self) -> bool {
        self.account.is_some()
            && self.is_on_source_chain()
            && !self.amount_ld().is_zero()
            && self.has_sufficient_balance()
            && self.is_recipient_valid()
            && self.in_flight.is_none()
    }

    pub fn can_approve(&self) -> bool {
        self.needs_approval()
            && self.is_on_source_chain()
            && !self.amount_ld().is_zero()
            && self.in_flight.is_none()
    }

    pub fn can_bridge(&self) -> bool {
        self.can_quote() && self.is_token_configured() && !self.needs_approval()
    }

    /// Recipient to send to; falls back to the connected account
    pub fn recipient_address(&self) -> Result<Address, BridgeError> {
        let account = self.account.ok_or(BridgeError::NotConnected)?;
        if self.recipient.trim().is_empty() {
            return Ok(account);
        }
        amounts::parse_recipient(&self.recipient).ok_or(BridgeError::InvalidRecipient)
    }

    pub fn build_send_param(&self) -> Result<SendParam, BridgeError> {
        Ok(SendParam::new(
            self.route().dst_eid(),
            self.recipient_address()?,
            self.amount_ld(),
            self.min_amount_ld(),
        ))
    }

    // ------------------------------------------------------------------
    // Gating
    // ------------------------------------------------------------------

    fn ensure_source_chain(&self, action: &'static str) -> Result<(), BridgeError> {
        if self.is_on_source_chain() {
            return Ok(());
        }
        let source = self.route().source;
        Err(BridgeError::WrongNetwork {
            label: source.label,
            action,
            expected: source.chain_id,
            actual: self.chain_id,
        })
    }

    /// Check everything a quote needs, returning the first failing condition
    pub fn check_quote(&self) -> Result<(), BridgeError> {
        if self.account.is_none() {
            return Err(BridgeError::NotConnected);
        }
        self.ensure_source_chain("before requesting a quote")?;
        if self.amount_ld().is_zero() {
            return Err(BridgeError::ZeroAmount);
        }
        if !self.is_recipient_valid() {
            return Err(BridgeError::InvalidRecipient);
        }
        if !self.has_sufficient_balance() {
            return Err(BridgeError::InsufficientBalance);
        }
        Ok(())
    }

    pub fn check_approve(&self) -> Result<(), BridgeError> {
        if self.account.is_none() {
            return Err(BridgeError::NotConnected);
        }
        if !self.is_token_configured() || self.amount_ld().is_zero() {
            return Err(BridgeError::ApprovalUnavailable(self.route().source.label));
        }
        self.ensure_source_chain("before approving")?;
        Ok(())
    }

    pub fn check_bridge(&self) -> Result<(), BridgeError> {
        if self.account.is_none() {
            return Err(BridgeError::NotConnected);
        }
        self.ensure_source_chain("to submit the bridge transaction")?;
        if !self.is_token_configured() {
            return Err(BridgeError::TokenNotConfigured(self.route().source.label));
        }
        if self.amount_ld().is_zero() {
            return Err(BridgeError::ZeroAmount);
        }
        if !self.is_recipient_valid() {
            return Err(BridgeError::InvalidRecipient);
        }
        if !self.has_sufficient_balance() {
            return Err(BridgeError::InsufficientBalance);
        }
        if self.needs_approval() {
            return Err(BridgeError::ApprovalRequired);
        }
        Ok(())
    }

    /// Claim the in-flight slot
    pub fn begin(&mut self, op: Operation) -> Result<(), BridgeError> {
        if let Some(current) = self.in_flight {
            return Err(BridgeError::Busy(current));
        }
        self.in_flight = Some(op);
        Ok(())
    }

    /// Release the slot if `op` still holds it
    pub fn finish(&mut self, op: Operation) {
        if self.in_flight == Some(op) {
            self.in_flight = None;
        }
    }
}

/// Session shared between the operation driver and wallet listeners
pub type SharedSession = Arc<Mutex<BridgeSession>>;

pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, BridgeSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the in-flight slot for one operation and releases it on drop
#[must_use = "the in-flight slot is released when the guard is dropped"]
pub struct InFlightGuard {
    session: SharedSession,
    op: Operation,
}

impl InFlightGuard {
    pub fn acquire(session: &SharedSession, op: Operation) -> Result<Self, BridgeError> {
        Self::acquire_checked(session, op, |_| Ok(())).map(|(guard, ())| guard)
    }

    /// Run `prepare` and claim the slot under a single lock
    ///
    /// Nothing is claimed when `prepare` fails or another operation is
    /// already running.
    pub fn acquire_checked<T>(
        session: &SharedSession,
        op: Operation,
        prepare: impl FnOnce(&mut BridgeSession) -> Result<T, BridgeError>,
    ) -> Result<(Self, T), BridgeError> {
        let mut guard = lock_session(session);
        if let Some(current) = guard.in_flight() {
            return Err(BridgeError::Busy(current));
        }
        let prepared = prepare(&mut guard)?;
        guard.begin(op)?;
        drop(guard);
        Ok((
            Self {
                session: session.clone(),
                op,
            },
            prepared,
        ))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_session(&self.session).finish(self.op);
    }
}
