//! Settable exchange-rate oracle.
//!
//! Stands in for the lending-manager integration during development and
//! testing. The rate can be moved with [`dev_set_rate`](StubOracle::dev_set_rate)
//! and the oracle can be switched off to exercise failure propagation.

use serde::{Deserialize, Serialize};

use crate::{ExchangeRateOracle, OracleError, Result};

/// Default rate: one share is worth exactly one unit (18 decimals).
pub const DEFAULT_RATE: u128 = 1_000_000_000_000_000_000;

/// Default number of decimals in the reported rate.
pub const DEFAULT_RATE_DECIMALS: u32 = 18;

/// An in-process oracle returning whatever rate it was last given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubOracle {
    /// The current exchange rate, scaled by `10^decimals`.
    rate: u128,
    /// Decimals of `rate`.
    decimals: u32,
    /// When `false`, every rate request fails.
    available: bool,
}

impl StubOracle {
    /// Create a stub oracle with the default rate.
    pub fn new() -> Self {
        Self::with_rate(DEFAULT_RATE)
    }

    /// Create a stub oracle with a custom 18-decimal rate.
    pub fn with_rate(rate: u128) -> Self {
        Self {
            rate,
            decimals: DEFAULT_RATE_DECIMALS,
            available: true,
        }
    }

    /// Create a stub oracle with a custom rate and decimal count.
    pub fn with_rate_and_decimals(rate: u128, decimals: u32) -> Self {
        Self {
            rate,
            decimals,
            available: true,
        }
    }

    /// Get the configured rate without availability checks.
    pub fn get_rate(&self) -> u128 {
        self.rate
    }

    /// Set the exchange rate (development/testing only).
    ///
    /// # Arguments
    ///
    /// * `rate` - The new exchange rate
    pub fn dev_set_rate(&mut self, rate: u128) {
        tracing::warn!(new_rate = %rate, "stub oracle: rate changed (dev only)");
        self.rate = rate;
    }

    /// Grow the rate by `bps` basis points (development/testing only).
    pub fn dev_accrue_bps(&mut self, bps: u32) {
        let growth = self.rate.saturating_mul(u128::from(bps)) / 10_000;
        self.dev_set_rate(self.rate.saturating_add(growth));
    }

    /// Make the oracle fail (or succeed again) on every request.
    pub fn set_available(&mut self, available: bool) {
        tracing::warn!(available, "stub oracle: availability changed (dev only)");
        self.available = available;
    }
}

impl Default for StubOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRateOracle for StubOracle {
    fn current_exchange_rate(&self) -> Result<u128> {
        if !self.available {
            return Err(OracleError::Unavailable(
                "stub oracle switched off".to_string(),
            ));
        }
        if self.rate == 0 {
            return Err(OracleError::InvalidRate(self.rate));
        }
        Ok(self.rate)
    }

    fn rate_decimals(&self) -> u32 {
        self.decimals
    }
}
