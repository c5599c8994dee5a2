//! Fixed-point helpers with 256-bit intermediates.

use uint::construct_uint;

use crate::RewardsError;

construct_uint! {
    pub struct U256(4);
}

/// Compute `a * b / denominator`, rounding down.
///
/// The product is formed in 256 bits so it cannot overflow; only a quotient
/// that does not fit in `u128` is an error.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> crate::Result<u128> {
    if denominator == 0 {
        return Err(RewardsError::DivisionByZero);
    }
    let quotient = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(RewardsError::Overflow)?
        / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(RewardsError::Overflow);
    }
    Ok(quotient.as_u128())
}
