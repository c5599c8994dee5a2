//! Read-only reward projection.
//!
//! A preview replays hypothetical deltas on a throwaway overlay of the
//! state store at a single observed index and reports what each pair would
//! have accrued. The overlay is dropped at the end, so neither state, index,
//! nonces nor events change, whether the preview succeeds or fails.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use nftboost_types::collection::RewardBasis;
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::{Address, Amount, BlockNumber, CollectionId};

use crate::registry::CollectionRegistry;
use crate::state::{PairKey, RewardStateStore, StagedState};
use crate::updates::apply_delta;
use crate::{Result, RewardsError};

/// Projected reward for one collection.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionPreview {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub collection: CollectionId,
    pub reward_basis: RewardBasis,
    /// Accrued plus pending reward after the simulated deltas.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub amount: Amount,
    pub projected_nft_balance: u64,
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub projected_balance: u128,
}

/// Projection over a set of collections.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPreview {
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub total: Amount,
    /// One entry per requested collection, in request order.
    pub collections: Vec<CollectionPreview>,
}

/// Reject a collection list that names any collection twice.
///
/// # Errors
///
/// - [`RewardsError::DuplicateCollection`] on the first repeated collection
pub fn unique_collections(collections: &[CollectionId]) -> Result<BTreeSet<CollectionId>> {
    let mut seen = BTreeSet::new();
    for collection in collections {
        if !seen.insert(*collection) {
            return Err(RewardsError::DuplicateCollection(*collection));
        }
    }
    Ok(seen)
}

/// Check simulated deltas: per collection they must be sorted by block and,
/// when `requested` is given, name only requested collections.
///
/// # Errors
///
/// - [`RewardsError::UnrequestedSimulation`] for a delta outside `requested`
/// - [`RewardsError::UnsortedSimulation`] if blocks decrease within a collection
pub fn check_simulations(
    requested: Option<&BTreeSet<CollectionId>>,
    simulated: &[BalanceUpdateDelta],
) -> Result<()> {
    let mut last_block: BTreeMap<CollectionId, BlockNumber> = BTreeMap::new();
    for delta in simulated {
        if let Some(requested) = requested {
            if !requested.contains(&delta.collection) {
                return Err(RewardsError::UnrequestedSimulation(delta.collection));
            }
        }
        if let Some(previous_block) = last_block.insert(delta.collection, delta.block) {
            if delta.block < previous_block {
                return Err(RewardsError::UnsortedSimulation {
                    collection: delta.collection,
                    block: delta.block,
                    previous_block,
                });
            }
        }
    }
    Ok(())
}

/// Project the rewards of `user` over `collections` at `current_index`,
/// as if `simulated` had been applied first.
///
/// # Errors
///
/// - [`RewardsError::DuplicateCollection`], [`RewardsError::UnrequestedSimulation`]
///   or [`RewardsError::UnsortedSimulation`] for malformed input
/// - [`RewardsError::NotWhitelisted`] if a requested collection is not whitelisted
/// - [`RewardsError::OutOfOrderUpdate`] or [`RewardsError::Underflow`] if a
///   simulated delta could not be applied for real
/// - [`RewardsError::Overflow`] on arithmetic overflow
pub fn project(
    store: &RewardStateStore,
    registry: &CollectionRegistry,
    current_index: u128,
    user: &Address,
    collections: &[CollectionId],
    simulated: &[BalanceUpdateDelta],
) -> Result<RewardPreview> {
    let requested = unique_collections(collections)?;
    check_simulations(Some(&requested), simulated)?;
    for collection in collections {
        registry.whitelisted(collection)?;
    }

    let mut staged = StagedState::new(store);
    for delta in simulated {
        apply_delta(&mut staged, registry, current_index, user, delta)?;
    }

    let mut preview = RewardPreview::default();
    for collection in collections {
        let config = registry.whitelisted(collection)?;
        let mut state = staged.get(&PairKey::new(*user, *collection));
        state.settle(config, current_index)?;

        preview.total = preview
            .total
            .checked_add(state.accrued_reward)
            .ok_or(RewardsError::Overflow)?;
        preview.collections.push(CollectionPreview {
            collection: *collection,
            reward_basis: config.reward_basis,
            amount: state.accrued_reward,
            projected_nft_balance: state.last_nft_balance,
            projected_balance: state.last_balance,
        });
    }

    tracing::trace!(
        user = %hex::encode(user),
        collections = collections.len(),
        simulated = simulated.len(),
        total = %preview.total,
        "projected rewards"
    );

    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nftboost_types::collection::CollectionConfig;
    use nftboost_types::PRECISION;

    const ALICE: Address = [0xA1; 32];
    const PUNKS: CollectionId = [0xC1; 32];
    const APES: CollectionId = [0xC2; 32];

    fn registry() -> CollectionRegistry {
        let mut registry = CollectionRegistry::new();
        for (collection, basis) in [(PUNKS, RewardBasis::Deposit), (APES, RewardBasis::Borrow)] {
            registry
                .add(CollectionConfig::new(collection, PRECISION / 10, basis, 5_000).expect("config"))
                .expect("add");
        }
        registry
    }

    fn funded_store(registry: &CollectionRegistry) -> RewardStateStore {
        let mut store = RewardStateStore::new();
        let mut staged = StagedState::new(&store);
        apply_delta(
            &mut staged,
            registry,
            PRECISION,
            &ALICE,
            &BalanceUpdateDelta::new(PUNKS, 10, 3, 1_000 * PRECISION as i128),
        )
        .expect("seed");
        let changes = staged.into_changes();
        store.commit(changes);
        store
    }

    #[test]
    fn test_preview_reports_pending_reward() {
        let registry = registry();
        let store = funded_store(&registry);
        let preview = project(
            &store,
            &registry,
            PRECISION + PRECISION / 10,
            &ALICE,
            &[PUNKS, APES],
            &[],
        )
        .expect("preview");

        assert_eq!(preview.total, 65 * PRECISION);
        assert_eq!(preview.collections.len(), 2);
        assert_eq!(preview.collections[0].amount, 65 * PRECISION);
        assert_eq!(preview.collections[0].reward_basis, RewardBasis::Deposit);
        assert_eq!(preview.collections[1].amount, 0);
        assert_eq!(preview.collections[1].reward_basis, RewardBasis::Borrow);
    }

    #[test]
    fn test_simulated_deltas_shape_projection_only() {
        let registry = registry();
        let store = funded_store(&registry);
        let before = store.get(&PairKey::new(ALICE, PUNKS));

        let preview = project(
            &store,
            &registry,
            PRECISION + PRECISION / 10,
            &ALICE,
            &[PUNKS],
            &[BalanceUpdateDelta::new(PUNKS, 20, 2, -(500 * PRECISION as i128))],
        )
        .expect("preview");

        // Span before the simulated delta accrues on the old balance.
        assert_eq!(preview.total, 65 * PRECISION);
        assert_eq!(preview.collections[0].projected_nft_balance, 5);
        assert_eq!(preview.collections[0].projected_balance, 500 * PRECISION);
        assert_eq!(store.get(&PairKey::new(ALICE, PUNKS)), before);
    }

    #[test]
    fn test_malformed_requests_rejected() {
        let registry = registry();
        let store = funded_store(&registry);

        assert!(matches!(
            project(&store, &registry, PRECISION, &ALICE, &[PUNKS, PUNKS], &[]),
            Err(RewardsError::DuplicateCollection(_))
        ));
        assert!(matches!(
            project(
                &store,
                &registry,
                PRECISION,
                &ALICE,
                &[PUNKS],
                &[BalanceUpdateDelta::new(APES, 20, 1, 0)]
            ),
            Err(RewardsError::UnrequestedSimulation(_))
        ));
        assert!(matches!(
            project(
                &store,
                &registry,
                PRECISION,
                &ALICE,
                &[PUNKS],
                &[
                    BalanceUpdateDelta::new(PUNKS, 30, 1, 0),
                    BalanceUpdateDelta::new(PUNKS, 20, 1, 0)
                ]
            ),
            Err(RewardsError::UnsortedSimulation {
                block: 20,
                previous_block: 30,
                ..
            })
        ));
        assert!(matches!(
            project(&store, &registry, PRECISION, &ALICE, &[[0xEE; 32]], &[]),
            Err(RewardsError::NotWhitelisted(_))
        ));
    }

    #[test]
    fn test_simulation_before_last_block_rejected() {
        let registry = registry();
        let store = funded_store(&registry);
        assert!(matches!(
            project(
                &store,
                &registry,
                PRECISION,
                &ALICE,
                &[PUNKS],
                &[BalanceUpdateDelta::new(PUNKS, 5, 1, 0)]
            ),
            Err(RewardsError::OutOfOrderUpdate {
                attempted_block: 5,
                last_block: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_simulated_underflow_rejected() {
        let registry = registry();
        let store = funded_store(&registry);
        assert!(matches!(
            project(
                &store,
                &registry,
                PRECISION,
                &ALICE,
                &[PUNKS],
                &[BalanceUpdateDelta::new(PUNKS, 20, -4, 0)]
            ),
            Err(RewardsError::Underflow { .. })
        ));
    }

    #[test]
    fn test_empty_request_is_zero() {
        let registry = registry();
        let store = RewardStateStore::new();
        let preview = project(&store, &registry, PRECISION, &ALICE, &[], &[]).expect("preview");
        assert_eq!(preview, RewardPreview::default());
    }
}
