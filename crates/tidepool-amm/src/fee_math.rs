//! Stateless swap pricing.
//!
//! The 0.3% fee is taken from the input side. Every intermediate product is
//! evaluated in 512-bit integers so no realistic reserve size can overflow;
//! only a final result wider than [`Amount`] is rejected.

use bnum::cast::As;
use bnum::types::{U256, U512};
use tidepool_core::{Amount, FEE_DENOMINATOR, FEE_NUMERATOR};

use crate::error::AmmError;

/// Output for an exact input, floored in favor of the pool
pub fn get_amount_out(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
) -> Result<Amount, AmmError> {
    if amount_in == 0 {
        return Err(AmmError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }

    let amount_in_with_fee = wide(amount_in) * wide(FEE_NUMERATOR);
    let numerator = amount_in_with_fee * wide(reserve_out);
    let denominator = wide(reserve_in) * wide(FEE_DENOMINATOR) + amount_in_with_fee;
    narrow(numerator / denominator)
}

/// Input required for an exact output.
///
/// The trailing `+ 1` rounds up so that feeding the result back through
/// [`get_amount_out`] never yields less than `amount_out`.
pub fn get_amount_in(
    amount_out: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
) -> Result<Amount, AmmError> {
    if amount_out == 0 {
        return Err(AmmError::InvalidAmount);
    }
    if reserve_in == 0 || reserve_out == 0 || amount_out >= reserve_out {
        return Err(AmmError::InsufficientLiquidity);
    }

    let numerator = wide(reserve_in) * wide(amount_out) * wide(FEE_DENOMINATOR);
    let denominator = wide(reserve_out - amount_out) * wide(FEE_NUMERATOR);
    narrow(numerator / denominator + U512::ONE)
}

/// Proportional amount of B for `amount_a` of A at the current price
pub fn quote(amount_a: Amount, reserve_a: Amount, reserve_b: Amount) -> Result<Amount, AmmError> {
    if amount_a == 0 {
        return Err(AmmError::InvalidAmount);
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    mul_div(amount_a, reserve_b, reserve_a)
}

/// `floor(a * b / c)` without intermediate overflow
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Result<Amount, AmmError> {
    if c == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    narrow(wide(a) * wide(b) / wide(c))
}

/// `floor(sqrt(a * b))`, exact for all inputs
pub fn sqrt_product(a: Amount, b: Amount) -> Amount {
    let n = U256::from(a) * U256::from(b);
    if n == U256::ZERO {
        return 0;
    }
    let mut x0 = n;
    let mut x1 = (x0 + U256::ONE) >> 1u32;
    while x1 < x0 {
        x0 = x1;
        x1 = (x1 + n / x1) >> 1u32;
    }
    // sqrt of a product of two u128 values always fits in u128
    x0.as_::<u128>()
}

/// Constant-product check with the fee kept on the input side:
/// `(b0*1000 - in0*3) * (b1*1000 - in1*3) >= r0 * r1 * 1000^2`
pub(crate) fn satisfies_invariant(
    balance0: Amount,
    balance1: Amount,
    amount0_in: Amount,
    amount1_in: Amount,
    reserve0: Amount,
    reserve1: Amount,
) -> bool {
    let fee = wide(FEE_DENOMINATOR - FEE_NUMERATOR);
    let scale = wide(FEE_DENOMINATOR);
    let adjusted0 = wide(balance0) * scale - wide(amount0_in) * fee;
    let adjusted1 = wide(balance1) * scale - wide(amount1_in) * fee;
    adjusted0 * adjusted1 >= wide(reserve0) * wide(reserve1) * scale * scale
}

fn wide(value: Amount) -> U512 {
    U512::from(value)
}

fn narrow(value: U512) -> Result<Amount, AmmError> {
    if value > wide(Amount::MAX) {
        return Err(AmmError::Overflow);
    }
    Ok(value.as_::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_out_concrete() {
        // 100 * 997 * 1000 / (1000 * 1000 + 100 * 997) = 90.66
        assert_eq!(get_amount_out(100, 1000, 1000).unwrap(), 90);
    }

    #[test]
    fn test_amount_in_concrete() {
        assert_eq!(get_amount_in(90, 1000, 1000).unwrap(), 100);
    }

    #[test]
    fn test_amount_out_rejects_zero_input() {
        assert!(matches!(
            get_amount_out(0, 1000, 1000),
            Err(AmmError::InvalidAmount)
        ));
    }

    #[test]
    fn test_amount_out_rejects_empty_reserves() {
        assert!(matches!(
            get_amount_out(10, 0, 1000),
            Err(AmmError::InsufficientLiquidity)
        ));
        assert!(matches!(
            get_amount_out(10, 1000, 0),
            Err(AmmError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn test_amount_in_rejects_draining_output() {
        assert!(matches!(
            get_amount_in(1000, 1000, 1000),
            Err(AmmError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn test_quote_floors() {
        assert_eq!(quote(10, 3, 7).unwrap(), 23);
        assert!(matches!(quote(0, 3, 7), Err(AmmError::InvalidAmount)));
        assert!(matches!(quote(1, 0, 7), Err(AmmError::InsufficientLiquidity)));
    }

    #[test]
    fn test_large_reserves_do_not_overflow() {
        let big = u128::MAX / 2;
        let out = get_amount_out(big, big, big).unwrap();
        assert!(out < big);
        assert!(out > big / 3);
    }

    #[test]
    fn test_amount_in_overflow_is_reported() {
        let result = get_amount_in(u128::MAX - 1, u128::MAX, u128::MAX);
        assert!(matches!(result, Err(AmmError::Overflow)));
    }

    #[test]
    fn test_sqrt_product() {
        assert_eq!(sqrt_product(0, 5), 0);
        assert_eq!(sqrt_product(1000, 1000), 1000);
        assert_eq!(sqrt_product(2, 3), 2);
        assert_eq!(sqrt_product(u128::MAX, u128::MAX), u128::MAX);
    }

    #[test]
    fn test_invariant_check_concrete() {
        // Reserves (1000, 1000), 100 of token0 in, 90 of token1 out
        assert!(satisfies_invariant(1100, 910, 100, 0, 1000, 1000));
        // 91 out is one unit too greedy
        assert!(!satisfies_invariant(1100, 909, 100, 0, 1000, 1000));
    }
}
