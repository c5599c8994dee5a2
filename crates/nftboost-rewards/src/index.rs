//! Global reward index.
//!
//! The index is the lending protocol's exchange rate expressed in
//! `PRECISION` units. It is read lazily whenever an operation needs it and
//! may only move forward: a rate that maps below the stored index is a hard
//! failure, never a clamp.
//!
//! ## Formula
//!
//! ```text
//! index = rate * PRECISION / 10^rate_decimals
//! ```

use nftboost_oracle::ExchangeRateOracle;
use nftboost_types::PRECISION;

use crate::math::mul_div;
use crate::{Result, RewardsError};

/// Convert an oracle rate to the index scale.
///
/// # Errors
///
/// - [`RewardsError::Overflow`] if `10^rate_decimals` or the result overflows
pub fn index_from_rate(rate: u128, rate_decimals: u32) -> Result<u128> {
    let scale = 10u128
        .checked_pow(rate_decimals)
        .ok_or(RewardsError::Overflow)?;
    mul_div(rate, PRECISION, scale)
}

/// Combine the stored index with a freshly computed one.
///
/// Returns `max(stored, computed)`. Pure and side-effect free; the caller
/// persists the result.
///
/// # Errors
///
/// - [`RewardsError::IndexRegression`] if `computed < stored`
pub fn advance_index(stored: u128, computed: u128) -> Result<u128> {
    if computed < stored {
        return Err(RewardsError::IndexRegression { stored, computed });
    }
    Ok(computed.max(stored))
}

/// Holds the last persisted global index.
#[derive(Debug, Clone, Default)]
pub struct GlobalIndexTracker {
    stored: u128,
}

impl GlobalIndexTracker {
    /// Create a tracker with a zero index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last persisted index.
    pub fn stored(&self) -> u128 {
        self.stored
    }

    /// Compute the current index from the oracle without persisting it.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Oracle`] if the oracle fails
    /// - [`RewardsError::IndexRegression`] if the rate went backwards
    pub fn observe<O: ExchangeRateOracle + ?Sized>(&self, oracle: &O) -> Result<u128> {
        let rate = oracle.current_exchange_rate()?;
        let computed = index_from_rate(rate, oracle.rate_decimals())?;
        advance_index(self.stored, computed)
    }

    /// Persist an index obtained from [`observe`](Self::observe).
    ///
    /// Values below the stored index are ignored.
    pub fn commit(&mut self, index: u128) {
        if index > self.stored {
            tracing::trace!(old = %self.stored, new = %index, "global index advanced");
            self.stored = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftboost_oracle::stub::StubOracle;
    use nftboost_oracle::OracleError;

    #[test]
    fn test_index_from_rate_same_scale() {
        assert_eq!(index_from_rate(PRECISION, 18).expect("index"), PRECISION);
    }

    #[test]
    fn test_index_from_rate_rescales() {
        // 1.05 with 6 decimals
        assert_eq!(
            index_from_rate(1_050_000, 6).expect("index"),
            PRECISION + PRECISION / 20
        );
    }

    #[test]
    fn test_advance_index_returns_max() {
        assert_eq!(advance_index(100, 150).expect("advance"), 150);
        assert_eq!(advance_index(100, 100).expect("advance"), 100);
    }

    #[test]
    fn test_advance_index_regression_fails() {
        assert!(matches!(
            advance_index(150, 100),
            Err(RewardsError::IndexRegression {
                stored: 150,
                computed: 100
            })
        ));
    }

    #[test]
    fn test_observe_does_not_persist() {
        let oracle = StubOracle::with_rate(2 * PRECISION);
        let tracker = GlobalIndexTracker::new();
        assert_eq!(tracker.observe(&oracle).expect("observe"), 2 * PRECISION);
        assert_eq!(tracker.stored(), 0);
    }

    #[test]
    fn test_commit_never_decreases() {
        let mut tracker = GlobalIndexTracker::new();
        tracker.commit(200);
        tracker.commit(100);
        assert_eq!(tracker.stored(), 200);
    }

    #[test]
    fn test_observe_after_oracle_regression_fails() {
        let mut oracle = StubOracle::with_rate(2 * PRECISION);
        let mut tracker = GlobalIndexTracker::new();
        let index = tracker.observe(&oracle).expect("observe");
        tracker.commit(index);

        oracle.dev_set_rate(PRECISION);
        assert!(matches!(
            tracker.observe(&oracle),
            Err(RewardsError::IndexRegression { .. })
        ));
    }

    #[test]
    fn test_observe_propagates_oracle_failure() {
        let mut oracle = StubOracle::new();
        oracle.set_available(false);
        let tracker = GlobalIndexTracker::new();
        assert!(matches!(
            tracker.observe(&oracle),
            Err(RewardsError::Oracle(OracleError::Unavailable(_)))
        ));
    }
}
