//! # nftboost-oracle
//!
//! Exchange-rate oracle adapters.
//!
//! The rewards engine derives its global index from the per-share value of
//! the yield-bearing asset held by the lending manager. That value is read
//! through the [`ExchangeRateOracle`] trait; any failure is surfaced to the
//! caller, never replaced with a default.
//!
//! ## Modules
//!
//! - [`stub`] — Settable in-process oracle for development and tests

pub mod stub;

/// Error types for oracle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The oracle could not produce a rate.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The reported rate is zero.
    #[error("invalid exchange rate: {0}")]
    InvalidRate(u128),
}

/// Convenience result type for oracle operations.
pub type Result<T> = std::result::Result<T, OracleError>;

/// Source of the yield-bearing asset's exchange rate.
///
/// Implementations report a per-share value that is expected to be
/// non-decreasing over time, scaled by `10^rate_decimals()`.
pub trait ExchangeRateOracle {
    /// Current exchange rate.
    ///
    /// # Errors
    ///
    /// Any error aborts the operation that requested the rate.
    fn current_exchange_rate(&self) -> Result<u128>;

    /// Number of decimals in the reported rate.
    fn rate_decimals(&self) -> u32 {
        18
    }
}

impl<T: ExchangeRateOracle + ?Sized> ExchangeRateOracle for Box<T> {
    fn current_exchange_rate(&self) -> Result<u128> {
        (**self).current_exchange_rate()
    }

    fn rate_decimals(&self) -> u32 {
        (**self).rate_decimals()
    }
}
