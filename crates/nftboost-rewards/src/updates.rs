//! Balance update processor.
//!
//! Batches of per-(user, collection) deltas arrive signed by the authorized
//! updater. Every delta is settled against the reward the previous balance
//! earned up to the current index before the new balance takes effect, so
//! the order of deltas within a pair matters and blocks may never go
//! backwards.

use serde::{Deserialize, Serialize};

use nftboost_crypto::ed25519::{Signature, SigningKey, VerifyingKey};
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::Address;

use crate::auth::{self, PayloadKind};
use crate::registry::CollectionRegistry;
use crate::state::{PairKey, StagedState, UserRewardState};
use crate::{Result, RewardsError};

/// Deltas for a single user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleUserUpdate {
    pub user: Address,
    pub deltas: Vec<BalanceUpdateDelta>,
}

impl SingleUserUpdate {
    pub fn new(user: Address, deltas: Vec<BalanceUpdateDelta>) -> Self {
        Self { user, deltas }
    }

    /// # Errors
    ///
    /// - [`RewardsError::EmptyBatch`] if there are no deltas
    pub fn validate(&self) -> Result<()> {
        if self.deltas.is_empty() {
            return Err(RewardsError::EmptyBatch);
        }
        Ok(())
    }

    /// Message the updater signs for this batch.
    pub fn signing_message(&self, domain: &[u8; 32], nonce: u64) -> [u8; 32] {
        auth::batch_signing_message(
            domain,
            PayloadKind::SingleUser,
            nonce,
            std::slice::from_ref(&self.user),
            &self.deltas,
        )
    }

    pub fn sign(&self, key: &SigningKey, domain: &[u8; 32], nonce: u64) -> Signature {
        key.sign(&self.signing_message(domain, nonce))
    }

    /// # Errors
    ///
    /// - [`RewardsError::InvalidSignature`] if the signature does not verify
    pub fn verify(
        &self,
        signer: &VerifyingKey,
        domain: &[u8; 32],
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        auth::verify_batch(
            signer,
            domain,
            PayloadKind::SingleUser,
            nonce,
            std::slice::from_ref(&self.user),
            &self.deltas,
            signature,
        )
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Address, &BalanceUpdateDelta)> {
        self.deltas.iter().map(move |delta| (&self.user, delta))
    }
}

/// Parallel arrays of users and deltas; `users[i]` receives `deltas[i]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiUserUpdate {
    pub users: Vec<Address>,
    pub deltas: Vec<BalanceUpdateDelta>,
}

impl MultiUserUpdate {
    pub fn new(users: Vec<Address>, deltas: Vec<BalanceUpdateDelta>) -> Self {
        Self { users, deltas }
    }

    /// # Errors
    ///
    /// - [`RewardsError::EmptyBatch`] if there are no deltas
    /// - [`RewardsError::BatchLengthMismatch`] if the arrays differ in length
    pub fn validate(&self) -> Result<()> {
        if self.deltas.is_empty() {
            return Err(RewardsError::EmptyBatch);
        }
        if self.users.len() != self.deltas.len() {
            return Err(RewardsError::BatchLengthMismatch {
                users: self.users.len(),
                deltas: self.deltas.len(),
            });
        }
        Ok(())
    }

    /// Message the updater signs for this batch.
    pub fn signing_message(&self, domain: &[u8; 32], nonce: u64) -> [u8; 32] {
        auth::batch_signing_message(
            domain,
            PayloadKind::MultiUser,
            nonce,
            &self.users,
            &self.deltas,
        )
    }

    pub fn sign(&self, key: &SigningKey, domain: &[u8; 32], nonce: u64) -> Signature {
        key.sign(&self.signing_message(domain, nonce))
    }

    /// # Errors
    ///
    /// - [`RewardsError::InvalidSignature`] if the signature does not verify
    pub fn verify(
        &self,
        signer: &VerifyingKey,
        domain: &[u8; 32],
        nonce: u64,
        signature: &Signature,
    ) -> Result<()> {
        auth::verify_batch(
            signer,
            domain,
            PayloadKind::MultiUser,
            nonce,
            &self.users,
            &self.deltas,
            signature,
        )
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Address, &BalanceUpdateDelta)> {
        self.users.iter().zip(self.deltas.iter())
    }
}

/// Result of an applied batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    /// Nonce the batch consumed.
    pub nonce: u64,
    /// Number of deltas applied.
    pub entries: usize,
    /// Distinct users touched.
    pub users: usize,
}

/// Apply one delta to the staged state.
///
/// Checks the whitelist and block ordering, settles the reward earned by the
/// previous balance up to `current_index`, then applies the NFT and balance
/// changes. On error the staged state is left untouched for this pair.
pub(crate) fn apply_delta(
    staged: &mut StagedState<'_>,
    registry: &CollectionRegistry,
    current_index: u128,
    user: &Address,
    delta: &BalanceUpdateDelta,
) -> Result<UserRewardState> {
    let config = registry.whitelisted(&delta.collection)?;
    let key = PairKey::new(*user, delta.collection);
    let mut state = staged.get(&key);

    state.ensure_ordered(&key, delta.block)?;
    let earned = state.settle(config, current_index)?;
    state.apply_delta(&key, delta)?;

    tracing::debug!(
        user = %hex::encode(user),
        collection = %hex::encode(delta.collection),
        block = delta.block,
        nft_delta = delta.nft_delta,
        balance_delta = %delta.balance_delta,
        earned = %earned,
        "applied balance delta"
    );

    staged.put(key, state);
    Ok(state)
}

/// Apply every entry of a batch in order, stopping at the first failure.
/// Returns the number of distinct users touched.
pub(crate) fn apply_entries<'e>(
    staged: &mut StagedState<'_>,
    registry: &CollectionRegistry,
    current_index: u128,
    entries: impl Iterator<Item = (&'e Address, &'e BalanceUpdateDelta)>,
) -> Result<usize> {
    let mut users = std::collections::BTreeSet::new();
    for (user, delta) in entries {
        apply_delta(staged, registry, current_index, user, delta)?;
        users.insert(*user);
    }
    Ok(users.len())
}
