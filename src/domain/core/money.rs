use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MoneyError {
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),

    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Convert a two-decimal amount to gateway minor units (cents), rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::OutOfRange(amount))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(MoneyError::OutOfRange(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn converts_to_cents() {
        assert_eq!(to_minor_units(dec!(19.99)), Ok(1999));
        assert_eq!(to_minor_units(dec!(100)), Ok(10000));
        assert_eq!(to_minor_units(dec!(0)), Ok(0));
    }

    #[test]
    fn rounds_fractional_cents() {
        assert_eq!(to_minor_units(dec!(10.005)), Ok(1001));
        assert_eq!(to_minor_units(dec!(10.004)), Ok(1000));
    }

    #[test]
    fn huge_amounts_are_out_of_range() {
        let beyond_i64 = dec!(1000000000000000000000);
        let beyond_decimal = dec!(1000000000000000000000000000);

        assert_eq!(to_minor_units(beyond_i64), Err(MoneyError::OutOfRange(beyond_i64)));
        assert_eq!(to_minor_units(beyond_decimal), Err(MoneyError::OutOfRange(beyond_decimal)));
        assert_eq!(to_minor_units(Decimal::MAX), Err(MoneyError::OutOfRange(Decimal::MAX)));
    }

    #[test]
    fn rejects_negative() {
        assert!(matches!(to_minor_units(dec!(-1.00)), Err(MoneyError::Negative(_))));
    }
}
