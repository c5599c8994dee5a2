//! # nftboost-types
//!
//! Shared domain types used across the nftboost workspace: identifiers,
//! fixed-point constants, collection configuration, balance-update deltas
//! and the events emitted by the rewards controller.

pub mod collection;
pub mod delta;
pub mod events;

/// A 32-byte account or contract address.
pub type Address = [u8; 32];
/// NFT collections are identified by their contract address.
pub type CollectionId = Address;
/// Block height used to order balance updates.
pub type BlockNumber = u64;
/// Token amounts in the underlying asset's smallest unit.
pub type Amount = u128;

/// The all-zero address. Never a valid principal or collection.
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Fixed-point unit for indices and boost factors (18 decimals).
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator for share percentages.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Maximum boost factor: `1 + boost / PRECISION` never exceeds 10x.
pub const MAX_BOOST: u128 = 9 * PRECISION;

/// Error types for domain-type validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// Share percentage exceeds 10,000 basis points.
    #[error("share percentage out of range: {0} bps (max 10000)")]
    ShareOutOfRange(u16),

    /// A required address was the zero address.
    #[error("zero address not allowed for {0}")]
    ZeroAddress(&'static str),
}

/// Convenience result type for domain-type validation.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Returns `true` if the address is the all-zero address.
pub fn is_zero_address(address: &Address) -> bool {
    address == &ZERO_ADDRESS
}
