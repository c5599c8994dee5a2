//! Per-(user, collection) reward state.
//!
//! Rows are created implicitly on first touch (all fields zero beforehand)
//! and never deleted. A pair is *active* while it tracks a non-zero NFT
//! count or balance; the store keeps a per-user index of active collections
//! up to date as rows are committed.
//!
//! Operations never write to the store directly. They stage their changes in
//! a [`StagedState`] and the controller commits the staged rows only once the
//! whole operation has succeeded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::{collection::CollectionConfig, Address, BlockNumber, CollectionId};

use crate::calculator;
use crate::{Result, RewardsError};

/// Composite key of the state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub user: Address,
    pub collection: CollectionId,
}

impl PairKey {
    pub fn new(user: Address, collection: CollectionId) -> Self {
        Self { user, collection }
    }
}

/// Which tracked value a delta would have driven negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    NftCount,
    Balance,
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NftCount => f.write_str("NFT count"),
            Self::Balance => f.write_str("balance"),
        }
    }
}

/// Reward bookkeeping for one (user, collection) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRewardState {
    /// Global index at the last checkpoint.
    pub last_reward_index: u128,
    /// Reward settled but not yet paid out.
    pub accrued_reward: u128,
    /// NFTs held at the last update.
    pub last_nft_balance: u64,
    /// Tracked deposit-equivalent balance at the last update.
    pub last_balance: u128,
    /// Block of the last applied update or claim checkpoint.
    pub last_update_block: BlockNumber,
}

impl UserRewardState {
    /// Whether the pair currently tracks any NFTs or balance.
    pub fn is_active(&self) -> bool {
        self.last_nft_balance > 0 || self.last_balance > 0
    }

    /// Reject a block earlier than the last processed one.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::OutOfOrderUpdate`] if `block < last_update_block`
    pub fn ensure_ordered(&self, key: &PairKey, block: BlockNumber) -> Result<()> {
        if block < self.last_update_block {
            return Err(RewardsError::OutOfOrderUpdate {
                user: key.user,
                collection: key.collection,
                attempted_block: block,
                last_block: self.last_update_block,
            });
        }
        Ok(())
    }

    /// Settle the reward earned by the current balance since the last
    /// checkpoint into `accrued_reward` and move the checkpoint to
    /// `current_index`. Returns the newly earned amount.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::IndexRegression`] if `current_index` is below the checkpoint
    /// - [`RewardsError::Overflow`] on arithmetic overflow
    pub fn settle(&mut self, config: &CollectionConfig, current_index: u128) -> Result<u128> {
        let index_delta = current_index.checked_sub(self.last_reward_index).ok_or(
            RewardsError::IndexRegression {
                stored: self.last_reward_index,
                computed: current_index,
            },
        )?;

        let earned = calculator::reward(
            self.last_balance,
            self.last_nft_balance,
            config.beta,
            config.share_bps,
            index_delta,
            self.last_reward_index,
        )?;

        self.accrued_reward = self
            .accrued_reward
            .checked_add(earned)
            .ok_or(RewardsError::Overflow)?;
        self.last_reward_index = current_index;

        Ok(earned)
    }

    /// Apply a delta's NFT and balance changes and advance the block.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Underflow`] if either value would become negative
    /// - [`RewardsError::Overflow`] if either value would overflow
    pub fn apply_delta(&mut self, key: &PairKey, delta: &BalanceUpdateDelta) -> Result<()> {
        let nft_balance = if delta.nft_delta < 0 {
            let decrease = delta.nft_delta.unsigned_abs();
            self.last_nft_balance
                .checked_sub(decrease)
                .ok_or(RewardsError::Underflow {
                    user: key.user,
                    collection: key.collection,
                    field: TrackedField::NftCount,
                    current: u128::from(self.last_nft_balance),
                    decrease: u128::from(decrease),
                })?
        } else {
            self.last_nft_balance
                .checked_add(delta.nft_delta.unsigned_abs())
                .ok_or(RewardsError::Overflow)?
        };

        let balance = if delta.balance_delta < 0 {
            let decrease = delta.balance_delta.unsigned_abs();
            self.last_balance
                .checked_sub(decrease)
                .ok_or(RewardsError::Underflow {
                    user: key.user,
                    collection: key.collection,
                    field: TrackedField::Balance,
                    current: self.last_balance,
                    decrease,
                })?
        } else {
            self.last_balance
                .checked_add(delta.balance_delta.unsigned_abs())
                .ok_or(RewardsError::Overflow)?
        };

        self.last_nft_balance = nft_balance;
        self.last_balance = balance;
        self.last_update_block = delta.block;
        Ok(())
    }
}

/// The committed state table plus its per-user secondary indexes.
#[derive(Debug, Clone, Default)]
pub struct RewardStateStore {
    states: HashMap<PairKey, UserRewardState>,
    /// Every collection a user has ever touched.
    touched: HashMap<Address, BTreeSet<CollectionId>>,
    /// Collections where the user currently tracks NFTs or balance.
    active: HashMap<Address, BTreeSet<CollectionId>>,
}

impl RewardStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a pair; all-zero if the pair was never touched.
    pub fn get(&self, key: &PairKey) -> UserRewardState {
        self.states.get(key).copied().unwrap_or_default()
    }

    /// Whether a row exists for the pair.
    pub fn contains(&self, key: &PairKey) -> bool {
        self.states.contains_key(key)
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Active collections of a user, in ascending order.
    pub fn active_collections(&self, user: &Address) -> Vec<CollectionId> {
        self.active
            .get(user)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Collections of a user that still carry an unpaid accrued reward.
    pub fn collections_with_deficit(&self, user: &Address) -> Vec<CollectionId> {
        self.touched
            .get(user)
            .map(|set| {
                set.iter()
                    .copied()
                    .filter(|collection| {
                        self.get(&PairKey::new(*user, *collection)).accrued_reward > 0
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Write staged rows and refresh the secondary indexes.
    pub fn commit(&mut self, changes: BTreeMap<PairKey, UserRewardState>) {
        for (key, state) in changes {
            self.touched
                .entry(key.user)
                .or_default()
                .insert(key.collection);

            if state.is_active() {
                self.active
                    .entry(key.user)
                    .or_default()
                    .insert(key.collection);
            } else if let Some(set) = self.active.get_mut(&key.user) {
                set.remove(&key.collection);
                if set.is_empty() {
                    self.active.remove(&key.user);
                }
            }

            self.states.insert(key, state);
        }
    }
}

/// Copy-on-write overlay over a [`RewardStateStore`].
///
/// Reads fall through to the committed store until a row is staged.
/// Dropping the overlay discards every staged change.
#[derive(Debug)]
pub struct StagedState<'a> {
    base: &'a RewardStateStore,
    pending: BTreeMap<PairKey, UserRewardState>,
}

impl<'a> StagedState<'a> {
    pub fn new(base: &'a RewardStateStore) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
        }
    }

    /// Staged state of a pair, falling back to the committed state.
    pub fn get(&self, key: &PairKey) -> UserRewardState {
        self.pending
            .get(key)
            .copied()
            .unwrap_or_else(|| self.base.get(key))
    }

    /// Stage a row.
    pub fn put(&mut self, key: PairKey, state: UserRewardState) {
        self.pending.insert(key, state);
    }

    /// Number of staged rows.
    pub fn staged_len(&self) -> usize {
        self.pending.len()
    }

    /// Consume the overlay, yielding the rows to commit.
    pub fn into_changes(self) -> BTreeMap<PairKey, UserRewardState> {
        self.pending
    }
}
