//! Claim settlement with deficit carry-forward.
//!
//! A claim settles every targeted pair up to the current index, asks the
//! yield source for the total due and spreads whatever it delivers across
//! the pairs in ascending collection order. Anything the source could not
//! supply stays in the pairs' `accrued_reward` for the next claim, so
//! `due == paid + sum(accrued after)` always holds.
//!
//! The transfer cannot be undone once the source reports it, so nothing after
//! it fails. A source that delivers more than asked is credited with `due`
//! and the surplus is reported as `excess`.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::{Address, Amount, BlockNumber, CollectionId};

use crate::registry::CollectionRegistry;
use crate::state::{PairKey, StagedState, UserRewardState};
use crate::updates::apply_delta;
use crate::yield_source::YieldSource;
use crate::{Result, RewardsError};

/// Result of a settled claim.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    /// Total accrued over the targeted pairs at claim time.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub due: Amount,
    /// Amount credited against the accrual, at most `due`.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub paid: Amount,
    /// Amount the yield source delivered beyond `due`.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub excess: Amount,
    /// Pairs settled by the claim.
    pub settled: usize,
}

impl ClaimOutcome {
    /// Whether the yield source delivered less than was due.
    pub fn is_capped(&self) -> bool {
        self.paid < self.due
    }
}

/// A claim by `user` at `block` against `targets`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClaimRequest<'a> {
    pub user: &'a Address,
    pub block: BlockNumber,
    /// Whitelisted collections, sorted ascending.
    pub targets: &'a [CollectionId],
    /// Deltas applied for real before settlement.
    pub simulated: &'a [BalanceUpdateDelta],
}

/// Settle and pay out a claim on the staged state.
///
/// # Errors
///
/// - [`RewardsError::NotWhitelisted`], [`RewardsError::OutOfOrderUpdate`] or
///   [`RewardsError::Underflow`] from applying a simulated delta
/// - [`RewardsError::YieldSource`] if the transfer fails
/// - [`RewardsError::Overflow`] on arithmetic overflow
///
/// Every error is raised before the transfer is requested.
pub(crate) fn settle_claim<Y: YieldSource + ?Sized>(
    staged: &mut StagedState<'_>,
    registry: &CollectionRegistry,
    yield_source: &mut Y,
    current_index: u128,
    request: ClaimRequest<'_>,
) -> Result<ClaimOutcome> {
    let ClaimRequest {
        user,
        block,
        targets,
        simulated,
    } = request;

    for delta in simulated {
        apply_delta(staged, registry, current_index, user, delta)?;
    }

    let mut settled: Vec<(PairKey, UserRewardState)> = Vec::with_capacity(targets.len());
    let mut due: Amount = 0;
    for collection in targets {
        let config = registry.whitelisted(collection)?;
        let key = PairKey::new(*user, *collection);
        let mut state = staged.get(&key);
        state.settle(config, current_index)?;
        due = due
            .checked_add(state.accrued_reward)
            .ok_or(RewardsError::Overflow)?;
        settled.push((key, state));
    }

    let received = if due > 0 {
        yield_source.request_yield_transfer(due, user)?
    } else {
        0
    };
    let paid = received.min(due);

    let mut remaining = paid;
    for (key, mut state) in settled.iter().copied() {
        let portion = remaining.min(state.accrued_reward);
        state.accrued_reward -= portion;
        remaining -= portion;
        state.last_update_block = state.last_update_block.max(block);
        staged.put(key, state);
    }

    Ok(ClaimOutcome {
        due,
        paid,
        excess: received - paid,
        settled: settled.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RewardStateStore;
    use crate::yield_source::{ReserveYieldSource, YieldSourceError};
    use nftboost_types::collection::{CollectionConfig, RewardBasis};
    use nftboost_types::PRECISION;

    const ALICE: Address = [0xA1; 32];
    const PUNKS: CollectionId = [0xC1; 32];
    const APES: CollectionId = [0xC2; 32];
    const START: u128 = PRECISION;
    const GROWN: u128 = PRECISION + PRECISION / 10;

    struct Overpaying;

    impl YieldSource for Overpaying {
        fn request_yield_transfer(
            &mut self,
            amount: Amount,
            _recipient: &Address,
        ) -> std::result::Result<Amount, YieldSourceError> {
            Ok(amount + 1)
        }
    }

    fn registry() -> CollectionRegistry {
        let mut registry = CollectionRegistry::new();
        for collection in [PUNKS, APES] {
            registry
                .add(
                    CollectionConfig::new(collection, PRECISION / 10, RewardBasis::Deposit, 5_000)
                        .expect("config"),
                )
                .expect("add");
        }
        registry
    }

    /// Alice holds 3 NFTs and 1000 units in both collections since `START`.
    fn store(registry: &CollectionRegistry) -> RewardStateStore {
        let mut store = RewardStateStore::new();
        let mut staged = StagedState::new(&store);
        for collection in [PUNKS, APES] {
            apply_delta(
                &mut staged,
                registry,
                START,
                &ALICE,
                &BalanceUpdateDelta::new(collection, 10, 3, 1_000 * PRECISION as i128),
            )
            .expect("seed");
        }
        let changes = staged.into_changes();
        store.commit(changes);
        store
    }

    #[test]
    fn test_full_payout_clears_accrual() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(1_000 * PRECISION);
        let mut staged = StagedState::new(&store);

        let outcome = settle_claim(
            &mut staged,
            &registry,
            &mut source,
            GROWN,
            ClaimRequest {
                user: &ALICE,
                block: 50,
                targets: &[PUNKS],
                simulated: &[],
            },
        )
        .expect("claim");

        assert_eq!(outcome.due, 65 * PRECISION);
        assert_eq!(outcome.paid, 65 * PRECISION);
        assert!(!outcome.is_capped());
        let state = staged.get(&PairKey::new(ALICE, PUNKS));
        assert_eq!(state.accrued_reward, 0);
        assert_eq!(state.last_reward_index, GROWN);
        assert_eq!(state.last_update_block, 50);
        // Untargeted pair untouched.
        assert_eq!(staged.get(&PairKey::new(ALICE, APES)).last_reward_index, START);
    }

    #[test]
    fn test_shortfall_allocated_in_collection_order() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(100 * PRECISION);
        let mut staged = StagedState::new(&store);

        let outcome = settle_claim(
            &mut staged,
            &registry,
            &mut source,
            GROWN,
            ClaimRequest {
                user: &ALICE,
                block: 50,
                targets: &[PUNKS, APES],
                simulated: &[],
            },
        )
        .expect("claim");

        assert_eq!(outcome.due, 130 * PRECISION);
        assert_eq!(outcome.paid, 100 * PRECISION);
        assert!(outcome.is_capped());
        assert_eq!(staged.get(&PairKey::new(ALICE, PUNKS)).accrued_reward, 0);
        assert_eq!(
            staged.get(&PairKey::new(ALICE, APES)).accrued_reward,
            30 * PRECISION
        );
    }

    #[test]
    fn test_zero_due_skips_transfer() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(0);
        source.set_enabled(false);
        let mut staged = StagedState::new(&store);

        let outcome = settle_claim(
            &mut staged,
            &registry,
            &mut source,
            START,
            ClaimRequest {
                user: &ALICE,
                block: 70,
                targets: &[PUNKS],
                simulated: &[],
            },
        )
        .expect("claim");

        assert_eq!(outcome, ClaimOutcome {
                due: 0,
                paid: 0,
                excess: 0,
                settled: 1
            });
        assert_eq!(staged.get(&PairKey::new(ALICE, PUNKS)).last_update_block, 70);
    }

    #[test]
    fn test_checkpoint_never_moves_block_back() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(0);
        let mut staged = StagedState::new(&store);

        settle_claim(
            &mut staged,
            &registry,
            &mut source,
            START,
            ClaimRequest {
                user: &ALICE,
                block: 1,
                targets: &[PUNKS],
                simulated: &[],
            },
        )
        .expect("claim");
        assert_eq!(staged.get(&PairKey::new(ALICE, PUNKS)).last_update_block, 10);
    }

    #[test]
    fn test_overpaying_source_settles_due_only() {
        let registry = registry();
        let store = store(&registry);
        let mut staged = StagedState::new(&store);

        let outcome = settle_claim(
            &mut staged,
            &registry,
            &mut Overpaying,
            GROWN,
            ClaimRequest {
                user: &ALICE,
                block: 50,
                targets: &[PUNKS],
                simulated: &[],
            },
        )
        .expect("claim");

        assert_eq!(outcome.due, 65 * PRECISION);
        assert_eq!(outcome.paid, 65 * PRECISION);
        assert_eq!(outcome.excess, 1);
        assert!(!outcome.is_capped());
        assert_eq!(staged.get(&PairKey::new(ALICE, PUNKS)).accrued_reward, 0);
    }

    #[test]
    fn test_failing_source_propagates() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(100);
        source.set_enabled(false);
        let mut staged = StagedState::new(&store);

        assert!(matches!(
            settle_claim(
                &mut staged,
                &registry,
                &mut source,
                GROWN,
                ClaimRequest {
                    user: &ALICE,
                    block: 50,
                    targets: &[PUNKS],
                    simulated: &[],
                },
            ),
            Err(RewardsError::YieldSource(YieldSourceError::Unavailable(_)))
        ));
    }

    #[test]
    fn test_simulated_deltas_applied_before_settlement() {
        let registry = registry();
        let store = store(&registry);
        let mut source = ReserveYieldSource::new(1_000 * PRECISION);
        let mut staged = StagedState::new(&store);

        let outcome = settle_claim(
            &mut staged,
            &registry,
            &mut source,
            GROWN,
            ClaimRequest {
                user: &ALICE,
                block: 50,
                targets: &[PUNKS],
                simulated: &[BalanceUpdateDelta::new(PUNKS, 40, 1, 0)],
            },
        )
        .expect("claim");

        // The span up to the simulated delta accrues on the old position.
        assert_eq!(outcome.due, 65 * PRECISION);
        let state = staged.get(&PairKey::new(ALICE, PUNKS));
        assert_eq!(state.last_nft_balance, 4);
        assert_eq!(state.last_update_block, 50);
    }
}
