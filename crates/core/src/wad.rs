//! 18-decimal fixed-point arithmetic on `U256`.
//!
//! Every rounding decision in the strategy lives here. Callers pick the
//! direction by name (`*_down` floors, `*_up` ceils) and never divide by hand,
//! so a conversion cannot silently change direction depending on call order.
//! All operations are checked: overflow, underflow and division by zero come
//! back as [`ArithmeticError`] instead of wrapping.

use alloy::primitives::U256;

use crate::error::ArithmeticError;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10000u64, 0, 0, 0]);

/// Decimals of a WAD value.
pub const WAD_DECIMALS: u8 = 18;

/// Pre-computed powers of 10 for decimal normalization
const POW10: [u128; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// Fast power of 10 lookup
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    if (exp as usize) < POW10.len() {
        U256::from(POW10[exp as usize])
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// `a * b / denominator`, rounded down.
#[inline]
pub fn mul_div_down(a: U256, b: U256, denominator: U256) -> Result<U256, ArithmeticError> {
    if denominator.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(ArithmeticError::Overflow)?;
    Ok(product / denominator)
}

/// `a * b / denominator`, rounded up.
#[inline]
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256, ArithmeticError> {
    if denominator.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    let product = a.checked_mul(b).ok_or(ArithmeticError::Overflow)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::from(1u8))
    }
}

/// Multiply two WAD values: (a * b) / WAD, rounded down.
#[inline]
pub fn mul_wad_down(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    mul_div_down(a, b, WAD)
}

/// Multiply two WAD values: (a * b) / WAD, rounded up.
#[inline]
pub fn mul_wad_up(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    mul_div_up(a, b, WAD)
}

/// Divide two WAD values: (a * WAD) / b, rounded down.
#[inline]
pub fn div_wad_down(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    mul_div_down(a, WAD, b)
}

/// Divide two WAD values: (a * WAD) / b, rounded up.
#[inline]
pub fn div_wad_up(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    mul_div_up(a, WAD, b)
}

/// Checked addition.
#[inline]
pub fn add(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow)
}

/// Checked subtraction.
#[inline]
pub fn sub(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Underflow)
}

/// Rescale a fixed-point value with `decimals` decimals to 18 decimals.
/// Scaling down truncates.
pub fn normalize_to_wad(value: U256, decimals: u8) -> Result<U256, ArithmeticError> {
    if decimals == WAD_DECIMALS {
        Ok(value)
    } else if decimals < WAD_DECIMALS {
        value
            .checked_mul(pow10(WAD_DECIMALS - decimals))
            .ok_or(ArithmeticError::Overflow)
    } else {
        Ok(value / pow10(decimals - WAD_DECIMALS))
    }
}

/// Convert basis points to a WAD fraction (7000 bps = 0.7e18).
#[inline]
pub fn from_bps(bps: u16) -> U256 {
    U256::from(bps) * WAD / BPS_DENOMINATOR
}

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

/// Convert f64 to WAD (18 decimals).
/// Keeps nine decimal places so that config fractions like `0.7` map to
/// exactly `7e17` instead of the nearest binary float.
#[inline]
pub fn f64_to_wad(value: f64) -> U256 {
    if value <= 0.0 || !value.is_finite() {
        return U256::ZERO;
    }
    U256::from((value * 1e9).round() as u128) * U256::from(1_000_000_000u64)
}
