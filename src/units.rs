//! Atomic-unit conversion
//!
//! One display unit equals 10^12 atomic units. Every conversion here runs on
//! arbitrary-precision integers; an amount never passes through a float
//! between its atomic form and its decimal string form.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint, Sign};

use crate::error::{Error, Result};

/// Decimal digits below one display unit.
pub const ATOMIC_SCALE: u32 = 12;

fn scale_factor() -> BigInt {
    BigInt::from(10u32).pow(ATOMIC_SCALE)
}

/// Render an atomic amount as a decimal string.
///
/// The fractional part is zero-padded to 12 digits and then stripped of
/// trailing zeros; integral amounts render without a decimal point. Negative
/// inputs (diagnostic deltas) render with a leading minus sign.
pub fn to_decimal(atomic: &BigInt) -> String {
    let sign = if atomic.sign() == Sign::Minus { "-" } else { "" };
    let magnitude = atomic.magnitude();

    let scale = BigUint::from(10u32).pow(ATOMIC_SCALE);
    let whole = magnitude / &scale;
    let frac = magnitude % &scale;

    if frac == BigUint::from(0u8) {
        return format!("{}{}", sign, whole);
    }

    let padded = format!("{:0>12}", frac.to_string());
    let trimmed = padded.trim_end_matches('0');
    format!("{}{}.{}", sign, whole, trimmed)
}

/// Render a non-negative atomic amount as a decimal string.
pub fn to_decimal_uint(atomic: &BigUint) -> String {
    to_decimal(&BigInt::from(atomic.clone()))
}

/// Parse a decimal string into atomic units.
///
/// Accepts plain ("0.1") and scientific ("2.5e-3") notation; the mantissa and
/// exponent are expanded with integer arithmetic only. Rejects negative,
/// non-finite, and malformed input, and any amount written with more than 12
/// fractional digits. The digit-count check runs on the literal input, so
/// "0.1000000000000" fails even though its trailing zero carries no value.
pub fn to_atomic(decimal: &str) -> Result<BigUint> {
    let decimal = decimal.trim();
    let parsed = BigDecimal::from_str(decimal)
        .map_err(|_| Error::InvalidAmount(format!("not a decimal number: {:?}", decimal)))?;

    if parsed.sign() == Sign::Minus {
        return Err(Error::InvalidAmount(format!(
            "amount must not be negative: {}",
            decimal
        )));
    }

    // as-written fractional digit count, before any normalization
    let (_, literal_scale) = parsed.as_bigint_and_exponent();
    if literal_scale > ATOMIC_SCALE as i64 {
        return Err(Error::InvalidAmount(format!(
            "amount {} is finer than one atomic unit (max {} fractional digits)",
            decimal, ATOMIC_SCALE
        )));
    }

    let scaled = (parsed * BigDecimal::from(scale_factor())).normalized();
    let (digits, exponent) = scaled.into_bigint_and_exponent();
    if exponent > 0 {
        return Err(Error::InvalidAmount(format!(
            "amount {} is finer than one atomic unit (max {} fractional digits)",
            decimal, ATOMIC_SCALE
        )));
    }

    let atomic = digits * BigInt::from(10u32).pow(exponent.unsigned_abs() as u32);
    atomic
        .to_biguint()
        .ok_or_else(|| Error::InvalidAmount(format!("amount must not be negative: {}", decimal)))
}

/// Parse an `f64` into atomic units via its canonical string form.
pub fn to_atomic_f64(value: f64) -> Result<BigUint> {
    if !value.is_finite() {
        return Err(Error::InvalidAmount(format!(
            "amount must be finite: {}",
            value
        )));
    }
    if value < 0.0 {
        return Err(Error::InvalidAmount(format!(
            "amount must not be negative: {}",
            value
        )));
    }
    to_atomic(&value.to_string())
}

/// Sum atomic amounts without overflow or precision loss.
pub fn sum<'a, I>(amounts: I) -> BigUint
where
    I: IntoIterator<Item = &'a BigUint>,
{
    amounts
        .into_iter()
        .fold(BigUint::from(0u8), |acc, a| acc + a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atomic(s: &str) -> BigUint {
        BigUint::from_str(s).unwrap()
    }

    #[test]
    fn test_to_decimal_formatting() {
        assert_eq!(to_decimal(&BigInt::from(0)), "0");
        assert_eq!(to_decimal(&BigInt::from(1_000_000_000_000u64)), "1");
        assert_eq!(to_decimal(&BigInt::from(100_000_000_000u64)), "0.1");
        assert_eq!(to_decimal(&BigInt::from(1u64)), "0.000000000001");
        assert_eq!(
            to_decimal(&BigInt::from(1_234_500_000_000u64)),
            "1.2345"
        );
        // negative diagnostic delta
        assert_eq!(to_decimal(&BigInt::from(-500_000_000_000i64)), "-0.5");
    }

    #[test]
    fn test_to_atomic_plain() {
        assert_eq!(to_atomic("0").unwrap(), atomic("0"));
        assert_eq!(to_atomic("1").unwrap(), atomic("1000000000000"));
        assert_eq!(to_atomic("0.1").unwrap(), atomic("100000000000"));
        assert_eq!(to_atomic("12.345").unwrap(), atomic("12345000000000"));
        // trailing zeros up to the 12th digit are fine
        assert_eq!(to_atomic("0.100000000000").unwrap(), atomic("100000000000"));
    }

    #[test]
    fn test_to_atomic_scientific_notation() {
        assert_eq!(to_atomic("1e-12").unwrap(), atomic("1"));
        assert_eq!(to_atomic("2.5e-3").unwrap(), atomic("2500000000"));
        assert_eq!(to_atomic("1e3").unwrap(), atomic("1000000000000000"));
        assert_eq!(
            to_atomic("1.5e30").unwrap(),
            atomic("1500000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn test_to_atomic_rejects_excess_precision() {
        // exactly 12 fractional digits succeeds
        assert_eq!(to_atomic("0.000000000001").unwrap(), atomic("1"));
        // 13 fails
        assert!(matches!(
            to_atomic("0.0000000000001"),
            Err(Error::InvalidAmount(_))
        ));
        assert!(matches!(to_atomic("1e-13"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_excess_fractional_digits_fail_even_when_zero() {
        // 13 as-written digits fail regardless of the value they encode
        for case in ["0.1000000000000", "0.1000000000000000", "1.0000000000000"] {
            assert!(
                matches!(to_atomic(case), Err(Error::InvalidAmount(_))),
                "accepted {}",
                case
            );
        }
    }

    #[test]
    fn test_to_atomic_rejects_bad_input() {
        assert!(to_atomic("-1").is_err());
        assert!(to_atomic("-0.5").is_err());
        assert!(to_atomic("abc").is_err());
        assert!(to_atomic("").is_err());
        assert!(to_atomic("NaN").is_err());
        assert!(to_atomic("inf").is_err());
        assert!(to_atomic_f64(f64::NAN).is_err());
        assert!(to_atomic_f64(f64::INFINITY).is_err());
        assert!(to_atomic_f64(-0.5).is_err());
    }

    #[test]
    fn test_round_trip_law() {
        let cases = [
            "0",
            "1",
            "999999999999",
            "1000000000000",
            "1000000000001",
            "123456789012345678901234567890",
            // past 10^30
            "1000000000000000000000000000000000",
        ];
        for case in cases {
            let a = atomic(case);
            let rendered = to_decimal_uint(&a);
            assert_eq!(to_atomic(&rendered).unwrap(), a, "round trip for {}", case);
        }
    }

    #[test]
    fn test_sum_arbitrary_precision() {
        let big = atomic("999999999999999999999999999999");
        let amounts = vec![big.clone(), big.clone(), atomic("2")];
        assert_eq!(
            sum(amounts.iter()),
            atomic("2000000000000000000000000000000")
        );
        assert_eq!(sum(std::iter::empty::<&BigUint>()), atomic("0"));
    }
}
