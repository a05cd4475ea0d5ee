//! Fixed-point helpers shared by the curve.

use trickle_core::error::ArithmeticError;

/// Fixed-point exponentiation: computes `(base/precision)^exp` in fixed-point.
///
/// Uses binary exponentiation for O(log n) multiplications.
/// `base` and return value are in fixed-point with `precision` as denominator.
/// Each multiplication truncates, so the result never exceeds the exact value.
pub fn fixed_pow(base: u128, exp: u64, precision: u128) -> Result<u128, ArithmeticError> {
    if exp == 0 {
        return Ok(precision); // (base/precision)^0 = 1.0
    }

    let mut result: u128 = precision;
    let mut b: u128 = base;
    let mut e = exp;

    while e > 0 {
        if e & 1 == 1 {
            result = result
                .checked_mul(b)
                .ok_or(ArithmeticError::Overflow)?
                / precision;
        }
        e >>= 1;
        if e > 0 {
            b = b.checked_mul(b).ok_or(ArithmeticError::Overflow)? / precision;
        }
    }

    Ok(result)
}

/// `a * b / denominator` with a checked product.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, ArithmeticError> {
    if denominator == 0 {
        return Err(ArithmeticError::Overflow);
    }
    a.checked_mul(b)
        .map(|p| p / denominator)
        .ok_or(ArithmeticError::Overflow)
}
