//! USDC amount normalization.

use hlvault_core::{from_fixed_point, to_fixed_point, CoreError, CoreResult, USD_DECIMALS};
use rust_decimal::Decimal;
use std::str::FromStr;

/// A bridge amount in 6-decimal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedAmount {
    pub units: u64,
    /// `units` back in whole USDC.
    pub amount: Decimal,
    /// True when precision beyond 6 decimals was dropped.
    pub truncated: bool,
}

/// Convert to USDC units, truncating toward zero.
///
/// Never rounds up: the burned amount is never more than requested.
pub fn normalize_usdc_amount(amount: Decimal) -> CoreResult<NormalizedAmount> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::validation(
            "Bridge amount must be positive",
            "amount",
            amount,
        ));
    }

    let units = to_fixed_point(amount, USD_DECIMALS)?;
    let normalized = from_fixed_point(units, USD_DECIMALS)?;
    Ok(NormalizedAmount {
        units,
        amount: normalized,
        truncated: normalized != amount,
    })
}

/// Parse and normalize a textual amount.
pub fn parse_usdc_amount(raw: &str) -> CoreResult<NormalizedAmount> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| CoreError::validation(format!("Invalid USDC amount: {e}"), "amount", raw))?;
    normalize_usdc_amount(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_truncates_beyond_six_decimals() {
        let normalized = parse_usdc_amount("10.1234567").unwrap();
        assert_eq!(normalized.units, 10_123_456);
        assert_eq!(normalized.amount, dec!(10.123456));
        assert!(normalized.truncated);
    }

    #[test]
    fn test_truncation_never_rounds_up() {
        let normalized = normalize_usdc_amount(dec!(0.9999999)).unwrap();
        assert_eq!(normalized.units, 999_999);
        assert!(normalized.truncated);
    }

    #[test]
    fn test_exact_amount_not_truncated() {
        let normalized = normalize_usdc_amount(dec!(25.50)).unwrap();
        assert_eq!(normalized.units, 25_500_000);
        assert_eq!(normalized.amount, dec!(25.5));
        assert!(!normalized.truncated);
    }

    #[test]
    fn test_rejects_non_positive_and_garbage() {
        assert_eq!(
            normalize_usdc_amount(Decimal::ZERO).unwrap_err().field(),
            Some("amount")
        );
        assert!(normalize_usdc_amount(dec!(-1)).unwrap_err().is_validation());
        assert!(parse_usdc_amount("ten").unwrap_err().is_validation());
    }
}
