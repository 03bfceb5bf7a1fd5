//! Exact decimal arithmetic for money amounts.
//!
//! Every amount in tally is a single-currency [`Decimal`]. Equality and
//! zero checks go through a tolerance ([`EPSILON`], one cent) so that
//! rounding noise from upstream systems never flips a status.

use rust_decimal::Decimal;

/// Default tolerance for amount comparisons: `0.01`.
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Add two amounts.
#[must_use]
pub fn add(a: Decimal, b: Decimal) -> Decimal {
    a + b
}

/// Subtract `b` from `a`.
#[must_use]
pub fn subtract(a: Decimal, b: Decimal) -> Decimal {
    a - b
}

/// Check whether two amounts are equal within `epsilon`.
///
/// # Example
///
/// ```
/// use tally_core::amount::{approx_eq, EPSILON};
/// use rust_decimal_macros::dec;
///
/// assert!(approx_eq(dec!(100.00), dec!(100.004), EPSILON));
/// assert!(approx_eq(dec!(100.00), dec!(100.01), EPSILON));
/// assert!(!approx_eq(dec!(100.00), dec!(100.02), EPSILON));
/// ```
#[must_use]
pub fn approx_eq(a: Decimal, b: Decimal, epsilon: Decimal) -> bool {
    (a - b).abs() <= epsilon
}

/// Check whether an amount is zero within `epsilon`.
#[must_use]
pub fn is_near_zero(a: Decimal, epsilon: Decimal) -> bool {
    a.abs() <= epsilon
}

/// Sum a sequence of amounts.
///
/// Addition on [`Decimal`] is exact, so the result does not depend on the
/// iteration order.
pub fn sum<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_epsilon_is_one_cent() {
        assert_eq!(EPSILON, dec!(0.01));
    }

    #[test]
    fn test_add_subtract() {
        assert_eq!(add(dec!(0.10), dec!(0.20)), dec!(0.30));
        assert_eq!(subtract(dec!(10000), dec!(3000)), dec!(7000));
        assert_eq!(subtract(dec!(100), dec!(150)), dec!(-50));
    }

    #[test]
    fn test_approx_eq_boundary() {
        assert!(approx_eq(dec!(5.00), dec!(5.01), EPSILON));
        assert!(approx_eq(dec!(5.01), dec!(5.00), EPSILON));
        assert!(!approx_eq(dec!(5.00), dec!(5.011), EPSILON));
    }

    #[test]
    fn test_is_near_zero() {
        assert!(is_near_zero(dec!(0), EPSILON));
        assert!(is_near_zero(dec!(-0.01), EPSILON));
        assert!(!is_near_zero(dec!(0.02), EPSILON));
    }

    #[test]
    fn test_sum_no_float_drift() {
        let total = sum(std::iter::repeat(dec!(0.10)).take(10));
        assert_eq!(total, dec!(1.00));
        assert_eq!(sum(Vec::new()), Decimal::ZERO);
    }
}
