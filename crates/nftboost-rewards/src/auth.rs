//! Batch authorization: canonical encoding, signatures and nonces.
//!
//! The authorized updater signs the BLAKE3 digest (context
//! `"NftBoost v1 balance-update-batch"`) of the canonical encoding below.
//! Construction and verification are explicit functions; there is no
//! ambient signing context.
//!
//! ## Encoding (version 1)
//!
//! ```text
//! version (u8 = 1)
//! kind (u8: 1 = single user, 2 = multi user)
//! domain (32 bytes)
//! nonce (u64 LE)
//! user_count (u32 LE) || users (32 bytes each)
//! entry_count (u32 LE) || entries
//! entry = collection (32) || block (u64 LE) || nft_delta (i64 LE) || balance_delta (i128 LE)
//! ```

use std::collections::HashMap;

use nftboost_crypto::blake3::{self, contexts};
use nftboost_crypto::ed25519::{Signature, SigningKey, VerifyingKey};
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::Address;

use crate::{Result, RewardsError};

/// Version byte of the canonical encoding.
pub const ENCODING_VERSION: u8 = 1;

/// Size of one encoded entry in bytes.
const ENTRY_LEN: usize = 32 + 8 + 8 + 16;

/// Distinguishes single-user from multi-user payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadKind {
    SingleUser = 1,
    MultiUser = 2,
}

/// Canonical byte encoding of a batch.
pub fn encode_batch(
    domain: &[u8; 32],
    kind: PayloadKind,
    nonce: u64,
    users: &[Address],
    deltas: &[BalanceUpdateDelta],
) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(2 + 32 + 8 + 4 + users.len() * 32 + 4 + deltas.len() * ENTRY_LEN);
    out.push(ENCODING_VERSION);
    out.push(kind as u8);
    out.extend_from_slice(domain);
    out.extend_from_slice(&nonce.to_le_bytes());

    out.extend_from_slice(&(users.len() as u32).to_le_bytes());
    for user in users {
        out.extend_from_slice(user);
    }

    out.extend_from_slice(&(deltas.len() as u32).to_le_bytes());
    for delta in deltas {
        out.extend_from_slice(&delta.collection);
        out.extend_from_slice(&delta.block.to_le_bytes());
        out.extend_from_slice(&delta.nft_delta.to_le_bytes());
        out.extend_from_slice(&delta.balance_delta.to_le_bytes());
    }
    out
}

/// The 32-byte message the updater signs for a batch.
pub fn batch_signing_message(
    domain: &[u8; 32],
    kind: PayloadKind,
    nonce: u64,
    users: &[Address],
    deltas: &[BalanceUpdateDelta],
) -> [u8; 32] {
    blake3::derive_key(
        contexts::BALANCE_UPDATE_BATCH,
        &encode_batch(domain, kind, nonce, users, deltas),
    )
}

/// Sign a batch as the updater.
pub fn sign_batch(
    key: &SigningKey,
    domain: &[u8; 32],
    kind: PayloadKind,
    nonce: u64,
    users: &[Address],
    deltas: &[BalanceUpdateDelta],
) -> Signature {
    key.sign(&batch_signing_message(domain, kind, nonce, users, deltas))
}

/// Verify an updater signature over a batch.
///
/// # Errors
///
/// - [`RewardsError::InvalidSignature`] if the signature does not verify
pub fn verify_batch(
    signer: &VerifyingKey,
    domain: &[u8; 32],
    kind: PayloadKind,
    nonce: u64,
    users: &[Address],
    deltas: &[BalanceUpdateDelta],
    signature: &Signature,
) -> Result<()> {
    let message = batch_signing_message(domain, kind, nonce, users, deltas);
    signer
        .verify(&message, signature)
        .map_err(|_| RewardsError::InvalidSignature)
}

/// Per-signer replay counters.
#[derive(Debug, Clone, Default)]
pub struct NonceRegistry {
    nonces: HashMap<[u8; 32], u64>,
}

impl NonceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nonce the signer's next batch must carry.
    pub fn current(&self, signer: &VerifyingKey) -> u64 {
        self.nonces.get(signer.as_bytes()).copied().unwrap_or(0)
    }

    /// Reject a nonce other than the signer's current one.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::StaleNonce`] if `provided` is not current
    pub fn check(&self, signer: &VerifyingKey, provided: u64) -> Result<()> {
        let expected = self.current(signer);
        if provided != expected {
            return Err(RewardsError::StaleNonce { expected, provided });
        }
        Ok(())
    }

    /// Consume the signer's current nonce, returning it.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Overflow`] if the counter is exhausted
    pub fn advance(&mut self, signer: &VerifyingKey) -> Result<u64> {
        let slot = self.nonces.entry(signer.to_bytes()).or_insert(0);
        let consumed = *slot;
        *slot = consumed.checked_add(1).ok_or(RewardsError::Overflow)?;
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftboost_crypto::ed25519::KeyPair;

    const DOMAIN: [u8; 32] = [0xD0; 32];
    const ALICE: Address = [0xA1; 32];

    fn deltas() -> Vec<BalanceUpdateDelta> {
        vec![BalanceUpdateDelta::new([0xC1; 32], 100, 3, 1_000)]
    }

    #[test]
    fn test_encoding_layout() {
        let encoded = encode_batch(&DOMAIN, PayloadKind::SingleUser, 7, &[ALICE], &deltas());
        assert_eq!(encoded.len(), 2 + 32 + 8 + 4 + 32 + 4 + ENTRY_LEN);
        assert_eq!(encoded[0], ENCODING_VERSION);
        assert_eq!(encoded[1], PayloadKind::SingleUser as u8);
        assert_eq!(&encoded[2..34], &DOMAIN);
        assert_eq!(&encoded[34..42], &7u64.to_le_bytes());
        assert_eq!(&encoded[42..46], &1u32.to_le_bytes());
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = KeyPair::generate();
        let sig = sign_batch(&kp.signing_key, &DOMAIN, PayloadKind::SingleUser, 0, &[ALICE], &deltas());
        verify_batch(
            &kp.verifying_key,
            &DOMAIN,
            PayloadKind::SingleUser,
            0,
            &[ALICE],
            &deltas(),
            &sig,
        )
        .expect("valid signature");
    }

    #[test]
    fn test_tampered_delta_fails() {
        let kp = KeyPair::generate();
        let sig = sign_batch(&kp.signing_key, &DOMAIN, PayloadKind::SingleUser, 0, &[ALICE], &deltas());
        let mut tampered = deltas();
        tampered[0].balance_delta = 1_000_000;
        assert!(matches!(
            verify_batch(
                &kp.verifying_key,
                &DOMAIN,
                PayloadKind::SingleUser,
                0,
                &[ALICE],
                &tampered,
                &sig
            ),
            Err(RewardsError::InvalidSignature)
        ));
    }

    #[test]
    fn test_message_binds_nonce_kind_and_domain() {
        let base = batch_signing_message(&DOMAIN, PayloadKind::SingleUser, 0, &[ALICE], &deltas());
        assert_ne!(
            base,
            batch_signing_message(&DOMAIN, PayloadKind::SingleUser, 1, &[ALICE], &deltas())
        );
        assert_ne!(
            base,
            batch_signing_message(&DOMAIN, PayloadKind::MultiUser, 0, &[ALICE], &deltas())
        );
        assert_ne!(
            base,
            batch_signing_message(&[0xD1; 32], PayloadKind::SingleUser, 0, &[ALICE], &deltas())
        );
    }

    #[test]
    fn test_nonce_registry_advances_per_signer() {
        let a = KeyPair::generate().verifying_key;
        let b = KeyPair::generate().verifying_key;
        let mut nonces = NonceRegistry::new();

        assert_eq!(nonces.advance(&a).expect("advance"), 0);
        assert_eq!(nonces.current(&a), 1);
        assert_eq!(nonces.current(&b), 0);

        assert!(nonces.check(&a, 1).is_ok());
        assert!(matches!(
            nonces.check(&a, 0),
            Err(RewardsError::StaleNonce {
                expected: 1,
                provided: 0
            })
        ));
    }
}
