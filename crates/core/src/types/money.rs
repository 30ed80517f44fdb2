//! Money helpers.
//!
//! Prices are stored as `NUMERIC` / [`Decimal`] in their natural unit (e.g.
//! `449.99` for $449.99). Payment processors expect integer minor units, so
//! conversion happens only at that boundary.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Errors that can occur when converting an amount to minor units.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// Amount does not fit into an `i64` of minor units.
    #[error("amount is out of range")]
    OutOfRange,
}

/// Round an amount half-up (away from zero) to whole cents.
#[must_use]
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Number of significant decimal places in `amount` (`12.50` has 1).
#[must_use]
pub fn decimal_places(amount: Decimal) -> u32 {
    amount.normalize().scale()
}

/// Convert an amount to minor units (cents), rounding half-up to 2 places.
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for negative amounts and
/// [`MoneyError::OutOfRange`] if the result overflows `i64`.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use cyclemart_core::to_minor_units;
///
/// assert_eq!(to_minor_units(Decimal::new(44999, 2)), Ok(44_999));
/// assert_eq!(to_minor_units(Decimal::new(1005, 3)), Ok(101));
/// ```
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative);
    }

    round_to_cents(amount)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or(MoneyError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_whole_amount() {
        assert_eq!(to_minor_units(Decimal::new(1200, 0)), Ok(120_000));
    }

    #[test]
    fn test_minor_units_rounds_half_up() {
        assert_eq!(to_minor_units(Decimal::new(12_345, 3)), Ok(1235));
        assert_eq!(to_minor_units(Decimal::new(12_344, 3)), Ok(1234));
    }

    #[test]
    fn test_minor_units_zero() {
        assert_eq!(to_minor_units(Decimal::ZERO), Ok(0));
    }

    #[test]
    fn test_minor_units_negative() {
        assert_eq!(
            to_minor_units(Decimal::new(-1, 0)),
            Err(MoneyError::Negative)
        );
    }

    #[test]
    fn test_minor_units_overflow() {
        assert_eq!(to_minor_units(Decimal::MAX), Err(MoneyError::OutOfRange));
    }

    #[test]
    fn test_decimal_places_ignores_trailing_zeros() {
        assert_eq!(decimal_places(Decimal::new(1250, 2)), 1);
        assert_eq!(decimal_places(Decimal::new(1000, 2)), 0);
        assert_eq!(decimal_places(Decimal::new(1001, 3)), 3);
    }
}
