//! Fixed-point codec for the strategy contract wire format.
//!
//! Uses `rust_decimal` for exact decimal arithmetic; nothing here touches
//! binary floating point. Prices and sizes go on-chain as `uint64` scaled by
//! 10^8, USD class transfers and USDC bridge amounts by 10^6.

use crate::error::{CoreError, CoreResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places used for on-chain prices and sizes.
pub const WIRE_DECIMALS: u32 = 8;

/// Decimal places used for USD (and USDC) amounts.
pub const USD_DECIMALS: u32 = 6;

/// Maximum significant figures accepted by the exchange for a price.
pub const MAX_PRICE_SIG_FIGS: i32 = 5;

/// Maximum price decimals for perpetuals before subtracting `szDecimals`.
pub const PERP_MAX_DECIMALS: u32 = 6;

/// Maximum price decimals for spot before subtracting `szDecimals`.
pub const SPOT_MAX_DECIMALS: u32 = 8;

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// Encode a non-negative decimal as a `u64` scaled by 10^`decimal_places`.
///
/// Sub-unit precision beyond `decimal_places` is truncated toward zero.
pub fn to_fixed_point(value: Decimal, decimal_places: u32) -> CoreResult<u64> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::validation(
            "Value cannot be negative",
            "value",
            value,
        ));
    }

    let factor = 10u64
        .checked_pow(decimal_places)
        .map(Decimal::from)
        .ok_or_else(|| {
            CoreError::range_exceeded("Too many decimal places", "decimal_places", decimal_places)
        })?;

    let scaled = value
        .checked_mul(factor)
        .ok_or_else(|| CoreError::range_exceeded("Value exceeds uint64 maximum", "value", value))?;

    scaled
        .trunc()
        .to_u64()
        .ok_or_else(|| CoreError::range_exceeded("Value exceeds uint64 maximum", "value", value))
}

/// Decode a fixed-point `u64` back to a decimal. Exact, no rounding.
pub fn from_fixed_point(units: u64, decimal_places: u32) -> CoreResult<Decimal> {
    if decimal_places > MAX_SCALE {
        return Err(CoreError::range_exceeded(
            "Too many decimal places",
            "decimal_places",
            decimal_places,
        ));
    }
    Ok(Decimal::from_i128_with_scale(i128::from(units), decimal_places).normalize())
}

/// Round a price to what the exchange accepts.
///
/// Two limits apply at once:
/// - at most 5 significant figures;
/// - at most `6 - sz_decimals` (perp) or `8 - sz_decimals` (spot) decimals.
///
/// Whichever leaves fewer decimal places wins. Rounds half-up and returns a
/// normalized value, so applying it twice is a no-op.
pub fn format_price_for_exchange(
    price: Decimal,
    sz_decimals: u32,
    is_perp: bool,
) -> CoreResult<Decimal> {
    if price <= Decimal::ZERO {
        return Err(CoreError::validation("Price must be positive", "price", price));
    }

    let base = if is_perp {
        PERP_MAX_DECIMALS
    } else {
        SPOT_MAX_DECIMALS
    };
    let max_decimals = base.saturating_sub(sz_decimals) as i32;
    let sig_fig_decimals = MAX_PRICE_SIG_FIGS - order_of_magnitude(price) - 1;

    round_half_up(price, sig_fig_decimals.min(max_decimals))
}

/// Convert a precompile perp price (`uint64`) to a decimal.
///
/// Perp prices carry `6 - szDecimals` decimals.
pub fn convert_perp_price(price_units: u64, sz_decimals: u32) -> CoreResult<Decimal> {
    let exponent = PERP_MAX_DECIMALS as i64 - i64::from(sz_decimals);
    if exponent <= 0 {
        return Err(CoreError::validation(
            "Size decimals too large for perp price conversion",
            "sz_decimals",
            sz_decimals,
        ));
    }
    from_fixed_point(price_units, exponent as u32)
}

/// Convert a precompile spot price (`uint64`) to a decimal.
///
/// Spot prices carry `8 - szDecimals` decimals; a negative exponent scales up.
pub fn convert_spot_price(price_units: u64, base_sz_decimals: u32) -> CoreResult<Decimal> {
    let exponent = SPOT_MAX_DECIMALS as i64 - i64::from(base_sz_decimals);
    if exponent >= 0 {
        return from_fixed_point(price_units, exponent as u32);
    }

    let factor = 10u64
        .checked_pow((-exponent) as u32)
        .map(Decimal::from)
        .ok_or_else(|| {
            CoreError::range_exceeded("Spot exponent out of range", "sz_decimals", base_sz_decimals)
        })?;
    Decimal::from(price_units)
        .checked_mul(factor)
        .ok_or_else(|| CoreError::range_exceeded("Spot price overflow", "price", price_units))
}

/// Order of magnitude of a non-zero decimal: floor(log10(|value|)).
///
/// 12345 -> 4, 1234.5 -> 3, 0.123 -> -1, 0.00123 -> -3
fn order_of_magnitude(value: Decimal) -> i32 {
    let mantissa = value.mantissa().unsigned_abs();
    if mantissa == 0 {
        return 0;
    }
    let digits = mantissa.ilog10() as i32 + 1;
    digits - 1 - value.scale() as i32
}

/// Round half-up to `decimals` places; negative means left of the point.
fn round_half_up(value: Decimal, decimals: i32) -> CoreResult<Decimal> {
    if decimals >= 0 {
        return Ok(value
            .round_dp_with_strategy(decimals as u32, RoundingStrategy::MidpointAwayFromZero)
            .normalize());
    }

    let out_of_range = || CoreError::range_exceeded("Price too large to round", "price", value);
    let factor = 10i128
        .checked_pow(decimals.unsigned_abs())
        .and_then(|f| Decimal::try_from_i128_with_scale(f, 0).ok())
        .ok_or_else(out_of_range)?;
    (value / factor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(factor)
        .map(|rounded| rounded.normalize())
        .ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_point_round_trip() {
        let cases = [
            (dec!(0), 8),
            (dec!(1), 8),
            (dec!(1234.56789), 8),
            (dec!(0.00000001), 8),
            (dec!(10.123456), 6),
            (dec!(184467440737.09551615), 8),
        ];
        for (value, places) in cases {
            let units = to_fixed_point(value, places).unwrap();
            assert_eq!(from_fixed_point(units, places).unwrap(), value);
        }
    }

    #[test]
    fn test_to_fixed_point_truncates() {
        assert_eq!(to_fixed_point(dec!(1.123456789), 8).unwrap(), 112_345_678);
        assert_eq!(to_fixed_point(dec!(0.0000009), 6).unwrap(), 0);
    }

    #[test]
    fn test_to_fixed_point_rejects_negative() {
        let err = to_fixed_point(dec!(-0.5), 8).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_to_fixed_point_range_exceeded() {
        // u64::MAX / 1e8 ~= 184467440737.09551615
        let err = to_fixed_point(dec!(184467440737.09551616), 8).unwrap_err();
        assert!(matches!(err, CoreError::RangeExceeded { .. }));

        let err = to_fixed_point(dec!(1), 20).unwrap_err();
        assert!(matches!(err, CoreError::RangeExceeded { .. }));
    }

    #[test]
    fn test_format_price_documented_examples() {
        assert_eq!(format_price_for_exchange(dec!(1234.5), 3, true).unwrap(), dec!(1234.5));
        assert_eq!(format_price_for_exchange(dec!(1234.56), 3, true).unwrap(), dec!(1234.6));
        assert_eq!(format_price_for_exchange(dec!(123456), 3, true).unwrap(), dec!(123460));
        assert_eq!(format_price_for_exchange(dec!(1234.5678), 3, true).unwrap(), dec!(1234.6));
        assert_eq!(format_price_for_exchange(dec!(4500.12), 4, true).unwrap(), dec!(4500.1));
    }

    #[test]
    fn test_format_price_perp_decimal_caps() {
        let cases = [
            (dec!(1.23456789), 0, dec!(1.2346)),
            (dec!(1234.123456789), 0, dec!(1234.1)),
            (dec!(12.3456789), 1, dec!(12.346)),
            (dec!(123.456789), 2, dec!(123.46)),
            (dec!(1.23456), 3, dec!(1.235)),
            (dec!(1.2345), 4, dec!(1.23)),
            (dec!(12345.678), 4, dec!(12346)),
            (dec!(1.234), 5, dec!(1.2)),
            (dec!(12345.6), 5, dec!(12346)),
            (dec!(1234.56), 6, dec!(1235)),
            (dec!(123456.78), 6, dec!(123460)),
        ];
        for (price, sz, expected) in cases {
            assert_eq!(
                format_price_for_exchange(price, sz, true).unwrap(),
                expected,
                "price={price} sz={sz}"
            );
        }
    }

    #[test]
    fn test_format_price_spot_decimal_caps() {
        let cases = [
            (dec!(1.234567890123), 0, dec!(1.2346)),
            (dec!(1.234567890123), 4, dec!(1.2346)),
            (dec!(1.234567890123), 6, dec!(1.23)),
            (dec!(1234.56), 8, dec!(1235)),
            (dec!(0.000123456), 0, dec!(0.00012346)),
        ];
        for (price, sz, expected) in cases {
            assert_eq!(
                format_price_for_exchange(price, sz, false).unwrap(),
                expected,
                "price={price} sz={sz}"
            );
        }
    }

    #[test]
    fn test_format_price_eth_and_btc() {
        assert_eq!(format_price_for_exchange(dec!(3509.11), 4, true).unwrap(), dec!(3509.1));
        assert_eq!(format_price_for_exchange(dec!(4500.99), 4, true).unwrap(), dec!(4501));
        assert_eq!(format_price_for_exchange(dec!(4.5678), 4, true).unwrap(), dec!(4.57));
        assert_eq!(format_price_for_exchange(dec!(11445.5), 5, true).unwrap(), dec!(11446));
        assert_eq!(format_price_for_exchange(dec!(11100.2), 5, true).unwrap(), dec!(11100));
    }

    #[test]
    fn test_format_price_is_idempotent() {
        let prices = [
            dec!(9999.95),
            dec!(0.987654),
            dec!(1234.56),
            dec!(99999.5),
            dec!(42),
        ];
        for price in prices {
            for sz in 0..=6 {
                for is_perp in [true, false] {
                    let once = format_price_for_exchange(price, sz, is_perp).unwrap();
                    let twice = format_price_for_exchange(once, sz, is_perp).unwrap();
                    assert_eq!(once, twice, "price={price} sz={sz} perp={is_perp}");
                }
            }
        }
    }

    #[test]
    fn test_format_price_very_large_values() {
        assert_eq!(
            format_price_for_exchange(dec!(1000000000000000000000000), 0, true).unwrap(),
            dec!(1000000000000000000000000)
        );
        assert_eq!(
            format_price_for_exchange(dec!(123456789012345678901234567), 0, false).unwrap(),
            dec!(123460000000000000000000000)
        );

        assert_eq!(
            format_price_for_exchange(Decimal::MAX, 0, true).unwrap(),
            dec!(79228000000000000000000000000)
        );
    }

    #[test]
    fn test_format_price_rejects_non_positive() {
        assert!(format_price_for_exchange(dec!(0), 2, true).is_err());
        assert!(format_price_for_exchange(dec!(-1.5), 2, true).is_err());
    }

    #[test]
    fn test_convert_prices() {
        assert_eq!(convert_perp_price(3_509_100, 4).unwrap(), dec!(35091));
        assert_eq!(convert_perp_price(350_910, 5).unwrap(), dec!(35091));
        assert!(convert_perp_price(1, 6).is_err());

        assert_eq!(convert_spot_price(123_456, 2).unwrap(), dec!(0.123456));
        assert_eq!(convert_spot_price(12, 10).unwrap(), dec!(1200));
    }

    #[test]
    fn test_order_of_magnitude() {
        assert_eq!(order_of_magnitude(dec!(12345)), 4);
        assert_eq!(order_of_magnitude(dec!(1234.50)), 3);
        assert_eq!(order_of_magnitude(dec!(0.123)), -1);
        assert_eq!(order_of_magnitude(dec!(0.00123)), -3);
    }
}
