//! Amount, slippage and address helpers
//!
//! All amounts are in the token's local decimals ("LD") as used by the OFT
//! contracts. Parsing never fails: anything unparseable becomes zero, which
//! the gating logic treats as "nothing to do".

use alloy::primitives::{
    utils::{format_units, parse_units, ParseUnits},
    Address, B256, U256,
};

/// Slippage used when none (or garbage) is supplied
pub const DEFAULT_SLIPPAGE_PERCENT: u8 = 5;
/// Upper clamp for slippage so the minimum stays above zero
pub const MAX_SLIPPAGE_PERCENT: u8 = 99;
/// Decimals assumed until the token has been queried
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Parse a human-readable amount into local decimals
///
/// Empty input, negative values, malformed numbers and inputs with more
/// fractional digits than `decimals` all yield zero.
pub fn amount_ld(input: &str, decimals: u8) -> U256 {
    let input = input.trim();
    if input.is_empty() {
        return U256::ZERO;
    }
    // parse_units truncates excess precision instead of rejecting it
    if let Some((_, fraction)) = input.split_once('.') {
        if fraction.len() > decimals as usize {
            return U256::ZERO;
        }
    }
    match parse_units(input, decimals) {
        Ok(ParseUnits::U256(value)) => value,
        _ => U256::ZERO,
    }
}

/// Render local-decimal units for display
pub fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

/// Clamp a user-supplied slippage percentage into `0..=99`
///
/// NaN falls back to the default; fractional percentages are truncated.
pub fn normalize_slippage(percent: f64) -> u8 {
    if percent.is_nan() {
        return DEFAULT_SLIPPAGE_PERCENT;
    }
    percent.clamp(0.0, MAX_SLIPPAGE_PERCENT as f64).trunc() as u8
}

/// Minimum amount to receive after slippage: `amount * (100 - s) / 100`
///
/// Computed as `q*n + r*n/100` (with `amount = 100q + r`) so it cannot
/// overflow for any `U256` amount.
pub fn min_amount_ld(amount: U256, slippage_percent: u8) -> U256 {
    if amount.is_zero() {
        return U256::ZERO;
    }
    let slippage = slippage_percent.min(MAX_SLIPPAGE_PERCENT);
    let keep = U256::from(100 - slippage as u64);
    let hundred = U256::from(100u64);
    let (q, r) = (amount / hundred, amount % hundred);
    q * keep + r * keep / hundred
}

/// Whether the allowance is too small for `amount`
pub fn needs_approval(amount: U256, allowance: U256) -> bool {
    amount > allowance
}

/// Left-pad a 20-byte address into the 32-byte recipient LayerZero expects
pub fn address_to_bytes32(address: Address) -> B256 {
    address.into_word()
}

/// Parse a recipient the way wallets validate it
///
/// All-lowercase and all-uppercase hex are accepted as-is; mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_recipient(input: &str) -> Option<Address> {
    let input = input.trim();
    let digits = input.strip_prefix("0x").unwrap_or(input);
    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(input, None).ok()
    } else {
        input.parse().ok()
    }
}

/// An empty recipient means "send to myself" and is valid
pub fn is_recipient_valid(input: &str) -> bool {
    input.trim().is_empty() || parse_recipient(input).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_amount_ld_parses_decimals() {
        assert_eq!(amount_ld("1", 18), U256::from(10u64).pow(U256::from(18u64)));
        assert_eq!(amount_ld("1.5", 6), U256::from(1_500_000u64));
        assert_eq!(amount_ld(" 100 ", 0), U256::from(100u64));
    }

    #[test]
    fn test_amount_ld_invalid_is_zero() {
        assert_eq!(amount_ld("", 18), U256::ZERO);
        assert_eq!(amount_ld("abc", 18), U256::ZERO);
        assert_eq!(amount_ld("-1", 18), U256::ZERO);
    }

    #[test]
    fn test_amount_ld_excess_precision_is_zero() {
        assert_eq!(amount_ld("1.1234567", 6), U256::ZERO);
        assert_eq!(amount_ld("1.5", 0), U256::ZERO);
        assert_eq!(amount_ld("1.123456", 6), U256::from(1_123_456u64));
        assert_eq!(amount_ld("1.", 6), U256::from(1_000_000u64));
    }

    #[test]
    fn test_min_amount_ld() {
        assert_eq!(min_amount_ld(U256::from(100u64), 5), U256::from(95u64));
        assert_eq!(min_amount_ld(U256::from(101u64), 5), U256::from(95u64));
        assert_eq!(min_amount_ld(U256::from(1000u64), 0), U256::from(1000u64));
        assert_eq!(min_amount_ld(U256::from(1000u64), 99), U256::from(10u64));
        assert_eq!(min_amount_ld(U256::ZERO, 5), U256::ZERO);
    }

    #[test]
    fn test_min_amount_ld_does_not_overflow() {
        let min = min_amount_ld(U256::MAX, 5);
        assert!(min < U256::MAX);
        assert!(min > U256::MAX / U256::from(100u64) * U256::from(94u64));
    }

    #[test]
    fn test_normalize_slippage() {
        assert_eq!(normalize_slippage(f64::NAN), 5);
        assert_eq!(normalize_slippage(-3.0), 0);
        assert_eq!(normalize_slippage(150.0), 99);
        assert_eq!(normalize_slippage(2.9), 2);
        assert_eq!(normalize_slippage(f64::INFINITY), 99);
    }

    #[test]
    fn test_needs_approval() {
        assert!(needs_approval(U256::from(10u64), U256::from(9u64)));
        assert!(!needs_approval(U256::from(10u64), U256::from(10u64)));
        assert!(!needs_approval(U256::ZERO, U256::ZERO));
    }

    #[test]
    fn test_address_to_bytes32_left_pads() {
        let addr = address!("e13de1217939A6a7A2f93732685af892c84E2A7a");
        let word = address_to_bytes32(addr);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], addr.as_slice());
    }

    #[test]
    fn test_recipient_validation() {
        assert!(is_recipient_valid(""));
        assert!(is_recipient_valid("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"));
        assert!(is_recipient_valid("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        // Checksum broken by flipping the case of one letter
        assert!(!is_recipient_valid("0xD8dA6BF26964aF9D7eEd9e03E53415D37aA96045"));
        assert!(!is_recipient_valid("0x1234"));
        assert!(!is_recipient_valid("not an address"));
    }
}
