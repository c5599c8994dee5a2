//! # nftboost-crypto
//!
//! Cryptographic primitives for authorizing balance-update batches.
//!
//! The suite is fixed: Ed25519 signatures over BLAKE3 domain-separated
//! digests. There is no algorithm negotiation.
//!
//! ## Modules
//!
//! - [`blake3`] — Domain-separated BLAKE3 hashing and registered contexts
//! - [`ed25519`] — Ed25519 signing and verification (RFC 8032)

pub mod blake3;
pub mod ed25519;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
