//! # nftboost-rewards
//!
//! Reward accrual and settlement for holders of whitelisted NFT collections.
//!
//! Rewards follow a global index derived from the lending protocol's exchange
//! rate. Each (user, collection) pair checkpoints the index it last saw; the
//! reward for the elapsed index delta is proportional to the tracked balance,
//! scaled by the collection's share and boosted by the number of NFTs held.
//! Balance changes arrive as batches signed by an authorized updater and are
//! applied strictly in block order per pair.
//!
//! ## Modules
//!
//! - [`index`] — Global index tracker
//! - [`state`] — Per-pair reward state store with staged commits
//! - [`calculator`] — Boosted reward formula
//! - [`math`] — 256-bit mul-div
//! - [`auth`] — Canonical batch encoding, signatures and nonces
//! - [`updates`] — Balance update processor
//! - [`preview`] — Read-only reward projection
//! - [`claims`] — Claim settlement with deficit carry-forward
//! - [`registry`] — Whitelisted collection registry
//! - [`yield_source`] — Upstream yield source interface
//! - [`events`] — Ordered event log
//! - [`controller`] — The `RewardsController` facade

pub mod auth;
pub mod calculator;
pub mod claims;
pub mod controller;
pub mod events;
pub mod index;
pub mod math;
pub mod preview;
pub mod registry;
pub mod state;
pub mod updates;
pub mod yield_source;

use nftboost_oracle::OracleError;
use nftboost_types::{Address, BlockNumber, CollectionId, TypesError};

pub use claims::ClaimOutcome;
pub use controller::{CallContext, ClaimSimulationPolicy, ControllerParams, RewardsController};
pub use preview::{CollectionPreview, RewardPreview};
pub use state::{TrackedField, UserRewardState};
pub use updates::{BatchReceipt, MultiUserUpdate, SingleUserUpdate};
pub use yield_source::{ReserveYieldSource, YieldSource, YieldSourceError};

/// Error types for reward operations.
#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    // Authorization
    /// The batch signature does not verify against the payload.
    #[error("invalid batch signature")]
    InvalidSignature,

    /// The batch was signed by someone other than the authorized updater.
    #[error(
        "signer mismatch: expected {}, got {}",
        hex::encode(.expected),
        hex::encode(.actual)
    )]
    SignerMismatch {
        /// Authorized updater public key.
        expected: [u8; 32],
        /// Public key that signed the batch.
        actual: [u8; 32],
    },

    /// The batch nonce is not the signer's current nonce.
    #[error("stale nonce: expected {expected}, got {provided}")]
    StaleNonce {
        /// The signer's current nonce.
        expected: u64,
        /// The nonce the batch was signed for.
        provided: u64,
    },

    /// Caller is not the administrative principal.
    #[error("caller {} is not authorized", hex::encode(.0))]
    Unauthorized(Address),

    // Ordering
    /// A delta targets a block before the pair's last processed block.
    #[error(
        "out-of-order update for user {} collection {}: block {attempted_block} precedes last processed block {last_block}",
        hex::encode(.user),
        hex::encode(.collection)
    )]
    OutOfOrderUpdate {
        user: Address,
        collection: CollectionId,
        attempted_block: BlockNumber,
        last_block: BlockNumber,
    },

    /// Simulated deltas for a collection are not sorted by block.
    #[error(
        "simulated deltas for collection {} are not sorted: block {block} after block {previous_block}",
        hex::encode(.collection)
    )]
    UnsortedSimulation {
        collection: CollectionId,
        block: BlockNumber,
        previous_block: BlockNumber,
    },

    // Underflow
    /// A delta would drive a tracked value negative.
    #[error(
        "{field} underflow for user {} collection {}: current {current}, requested decrease {decrease}",
        hex::encode(.user),
        hex::encode(.collection)
    )]
    Underflow {
        user: Address,
        collection: CollectionId,
        field: TrackedField,
        current: u128,
        decrease: u128,
    },

    // Whitelist
    /// The collection is not whitelisted.
    #[error("collection {} is not whitelisted", hex::encode(.0))]
    NotWhitelisted(CollectionId),

    /// The collection is already whitelisted.
    #[error("collection {} is already whitelisted", hex::encode(.0))]
    AlreadyWhitelisted(CollectionId),

    // Configuration
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] TypesError),

    // Request shape
    /// A batch carried no deltas.
    #[error("empty batch")]
    EmptyBatch,

    /// Multi-user batch arrays differ in length.
    #[error("batch length mismatch: {users} users, {deltas} deltas")]
    BatchLengthMismatch { users: usize, deltas: usize },

    /// A collection was listed more than once.
    #[error("collection {} listed more than once", hex::encode(.0))]
    DuplicateCollection(CollectionId),

    /// A simulated delta names a collection that was not requested.
    #[error("simulated delta for unrequested collection {}", hex::encode(.0))]
    UnrequestedSimulation(CollectionId),

    // Claims
    /// The user has nothing to claim against.
    #[error("no rewards available")]
    NoRewards,

    /// Simulated deltas were supplied to a claim while the policy rejects them.
    #[error("simulated deltas are not accepted by claims")]
    SimulationRejected,

    /// The yield source failed.
    #[error("yield source error: {0}")]
    YieldSource(#[from] YieldSourceError),

    // Arithmetic and index
    /// Arithmetic overflow.
    #[error("arithmetic overflow")]
    Overflow,

    /// Division by zero in fixed-point arithmetic.
    #[error("division by zero")]
    DivisionByZero,

    /// The oracle-derived index fell below the stored index.
    #[error("reward index regression: stored {stored}, computed {computed}")]
    IndexRegression { stored: u128, computed: u128 },

    /// The exchange-rate oracle failed.
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
}

/// Convenience result type for reward operations.
pub type Result<T> = std::result::Result<T, RewardsError>;
