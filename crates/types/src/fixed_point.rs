//! Fixed-point arithmetic used by both accrual engines.
//!
//! All reward math is integer-only. Per-unit accumulators are scaled by
//! [`PRECISION`] so rounding loss stays below one base unit per operation.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Amount;

/// Scaling constant for per-share and per-power accumulators (1e20).
pub const PRECISION: u128 = 100_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("ratio {numerator}/{denominator} is below one")]
    RatioBelowOne { numerator: u128, denominator: u128 },
}

/// Compute `floor(a * b / c)` without losing precision to intermediate
/// overflow.
///
/// The product is attempted in `u128` first and only widened to a big integer
/// when it does not fit. The quotient itself must fit in `u128`.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    match a.checked_mul(b) {
        Some(product) => Ok(product / c),
        None => {
            let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
            wide.to_u128().ok_or(MathError::Overflow)
        }
    }
}

/// Compute `a * b / c` as a quotient and remainder, widening like
/// [`mul_div`]. The remainder is always below `c`.
pub fn mul_div_rem(a: u128, b: u128, c: u128) -> Result<(u128, u128), MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    match a.checked_mul(b) {
        Some(product) => Ok((product / c, product % c)),
        None => {
            let product = BigUint::from(a) * BigUint::from(b);
            let divisor = BigUint::from(c);
            let quotient = (&product / &divisor).to_u128().ok_or(MathError::Overflow)?;
            let remainder = (product % divisor).to_u128().ok_or(MathError::Overflow)?;
            Ok((quotient, remainder))
        }
    }
}

/// Convert an unsigned amount into the signed domain used by reward debts.
pub fn to_signed(value: u128) -> Result<i128, MathError> {
    i128::try_from(value).map_err(|_| MathError::Overflow)
}

/// A non-negative ratio pre-divided into a single scaled integer
/// (`numerator * PRECISION / denominator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FixedRatio(u128);

impl FixedRatio {
    pub const ONE: FixedRatio = FixedRatio(PRECISION);

    pub fn from_fraction(numerator: u128, denominator: u128) -> Result<Self, MathError> {
        mul_div(numerator, PRECISION, denominator).map(FixedRatio)
    }

    /// Like [`FixedRatio::from_fraction`] but rejects ratios below one.
    pub fn at_least_one(numerator: u128, denominator: u128) -> Result<Self, MathError> {
        if denominator == 0 {
            return Err(MathError::DivisionByZero);
        }
        if numerator < denominator {
            return Err(MathError::RatioBelowOne {
                numerator,
                denominator,
            });
        }
        Self::from_fraction(numerator, denominator)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Scale `value` by this ratio, rounding down.
    pub fn apply(&self, value: Amount) -> Result<Amount, MathError> {
        mul_div(value, self.0, PRECISION)
    }
}

impl Default for FixedRatio {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for FixedRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PRECISION;
        let frac = self.0 % PRECISION;
        write!(f, "{}.{:020}", whole, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_exact_when_product_fits() {
        assert_eq!(mul_div(10, 20, 3).unwrap(), 66);
        assert_eq!(mul_div(0, u128::MAX, 7).unwrap(), 0);
    }

    #[test]
    fn mul_div_widens_on_overflow() {
        // 1e30 * 1e20 overflows u128 but the quotient does not.
        let a = 1_000_000_000_000_000_000_000_000_000_000u128;
        assert_eq!(mul_div(a, PRECISION, PRECISION).unwrap(), a);
    }

    #[test]
    fn mul_div_rejects_oversized_quotient() {
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(MathError::Overflow));
        assert_eq!(mul_div(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn mul_div_rem_keeps_the_remainder() {
        assert_eq!(mul_div_rem(10, 20, 3).unwrap(), (66, 2));
        assert_eq!(mul_div_rem(10, 21, 3).unwrap(), (70, 0));
        let a = 1_000_000_000_000_000_000_000_000_000_001u128;
        assert_eq!(mul_div_rem(a, PRECISION, 3 * PRECISION).unwrap(), (a / 3, 2 * PRECISION));
        assert_eq!(mul_div_rem(1, 1, 0), Err(MathError::DivisionByZero));
    }

    #[test]
    fn ratio_below_one_rejected() {
        assert!(matches!(
            FixedRatio::at_least_one(1, 2),
            Err(MathError::RatioBelowOne { .. })
        ));
        assert_eq!(FixedRatio::at_least_one(2, 2).unwrap(), FixedRatio::ONE);
    }

    #[test]
    fn ratio_scales_values() {
        let ratio = FixedRatio::at_least_one(3, 2).unwrap();
        assert_eq!(ratio.apply(100).unwrap(), 150);
        assert_eq!(ratio.apply(3).unwrap(), 4);
        assert_eq!(ratio.to_string(), "1.50000000000000000000");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn quotient_and_remainder_rebuild_the_product(a in any::<u128>(), b in any::<u128>(), c in 1u128..) {
                if let Ok((quotient, remainder)) = mul_div_rem(a, b, c) {
                    prop_assert!(remainder < c);
                    prop_assert_eq!(
                        BigUint::from(quotient) * BigUint::from(c) + BigUint::from(remainder),
                        BigUint::from(a) * BigUint::from(b)
                    );
                    prop_assert_eq!(mul_div(a, b, c), Ok(quotient));
                }
            }

            #[test]
            fn floor_never_exceeds_true_quotient(a in any::<u128>(), b in any::<u128>(), c in 1u128..) {
                if let Ok(floor) = mul_div(a, b, c) {
                    prop_assert!(BigUint::from(floor) * BigUint::from(c) <= BigUint::from(a) * BigUint::from(b));
                }
            }
        }
    }
}
