//! Boosted reward formula.
//!
//! ## Formula
//!
//! ```text
//! base      = balance * index_delta / start_index
//! allocated = base * share_bps / 10_000
//! boost     = min(nft_count * beta, 9 * PRECISION)
//! reward    = allocated + allocated * boost / PRECISION
//! ```
//!
//! The multiplier `1 + boost / PRECISION` therefore stays within `[1, 10]`.

use nftboost_types::{BPS_DENOMINATOR, MAX_BOOST, PRECISION};

use crate::math::mul_div;
use crate::{Result, RewardsError};

/// Boost factor for holding `nft_count` NFTs, in `PRECISION` units, capped
/// at [`MAX_BOOST`].
pub fn boost_multiplier(nft_count: u64, beta: u128) -> u128 {
    u128::from(nft_count).saturating_mul(beta).min(MAX_BOOST)
}

/// Reward earned by `balance` over an index movement of `index_delta`
/// starting from `start_index`.
///
/// Returns zero when the balance, the index delta or the start index is zero.
///
/// # Errors
///
/// - [`RewardsError::Overflow`] if the reward does not fit in `u128`
pub fn reward(
    balance: u128,
    nft_count: u64,
    beta: u128,
    share_bps: u16,
    index_delta: u128,
    start_index: u128,
) -> Result<u128> {
    if balance == 0 || index_delta == 0 || start_index == 0 {
        return Ok(0);
    }

    let base = mul_div(balance, index_delta, start_index)?;
    let allocated = mul_div(base, u128::from(share_bps), u128::from(BPS_DENOMINATOR))?;
    let boost = boost_multiplier(nft_count, beta);
    let bonus = mul_div(allocated, boost, PRECISION)?;

    let total = allocated.checked_add(bonus).ok_or(RewardsError::Overflow)?;

    tracing::trace!(
        base = %base,
        allocated = %allocated,
        boost = %boost,
        total = %total,
        "computed boosted reward"
    );

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u128 = PRECISION;

    #[test]
    fn test_reference_scenario() {
        // 1000 units, index +10%, 50% share, 3 NFTs at 0.1 each => 65 units
        let beta = UNIT / 10;
        let result = reward(1_000 * UNIT, 3, beta, 5_000, UNIT / 10, UNIT).expect("reward");
        assert_eq!(result, 65 * UNIT);
    }

    #[test]
    fn test_zero_nfts_is_unboosted() {
        let result = reward(1_000 * UNIT, 0, UNIT, 10_000, UNIT / 10, UNIT).expect("reward");
        assert_eq!(result, 100 * UNIT);
    }

    #[test]
    fn test_zero_balance_earns_nothing() {
        assert_eq!(reward(0, 50, UNIT, 10_000, UNIT, UNIT).expect("reward"), 0);
    }

    #[test]
    fn test_zero_index_delta_earns_nothing() {
        assert_eq!(reward(1_000 * UNIT, 3, UNIT, 10_000, 0, UNIT).expect("reward"), 0);
    }

    #[test]
    fn test_zero_start_index_earns_nothing() {
        assert_eq!(reward(1_000 * UNIT, 3, UNIT, 10_000, UNIT, 0).expect("reward"), 0);
    }

    #[test]
    fn test_boost_is_capped_at_nine() {
        assert_eq!(boost_multiplier(1_000, UNIT), MAX_BOOST);
        assert_eq!(boost_multiplier(u64::MAX, u128::MAX), MAX_BOOST);

        // 10x total multiplier at the cap
        let result = reward(100 * UNIT, 1_000, UNIT, 10_000, UNIT / 10, UNIT).expect("reward");
        assert_eq!(result, 100 * UNIT);
    }

    #[test]
    fn test_boost_below_cap_is_linear() {
        assert_eq!(boost_multiplier(4, UNIT / 4), UNIT);
    }

    #[test]
    fn test_share_scales_allocation() {
        let full = reward(1_000 * UNIT, 0, 0, 10_000, UNIT / 10, UNIT).expect("full");
        let quarter = reward(1_000 * UNIT, 0, 0, 2_500, UNIT / 10, UNIT).expect("quarter");
        assert_eq!(quarter * 4, full);
    }

    #[test]
    fn test_start_index_normalizes_growth() {
        // Index moved 2.0 -> 2.2: same 10% growth as 1.0 -> 1.1
        let result = reward(1_000 * UNIT, 0, 0, 10_000, UNIT / 5, 2 * UNIT).expect("reward");
        assert_eq!(result, 100 * UNIT);
    }

    #[test]
    fn test_overflow_reported() {
        let result = reward(u128::MAX, 0, 0, 10_000, 2 * UNIT, UNIT);
        assert!(matches!(result, Err(RewardsError::Overflow)));
    }
}
