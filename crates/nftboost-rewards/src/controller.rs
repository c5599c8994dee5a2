//! The `RewardsController` facade.
//!
//! Owns the collection registry, the per-pair state store, signer nonces,
//! the stored global index and the event log, and drives the oracle and
//! yield source. Every mutating operation observes the index once, works on
//! a [`StagedState`] and commits state, nonce, index and events together
//! only after the whole operation has succeeded.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use nftboost_crypto::ed25519::{Signature, VerifyingKey};
use nftboost_oracle::ExchangeRateOracle;
use nftboost_types::collection::CollectionConfig;
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::events::{ClaimTarget, EventRecord, RewardsEvent};
use nftboost_types::{
    is_zero_address, Address, Amount, BlockNumber, CollectionId, TypesError, ZERO_ADDRESS,
};

use crate::auth::NonceRegistry;
use crate::claims::{self, ClaimOutcome, ClaimRequest};
use crate::events::EventLog;
use crate::index::GlobalIndexTracker;
use crate::preview::{self, RewardPreview};
use crate::registry::CollectionRegistry;
use crate::state::{PairKey, RewardStateStore, StagedState, UserRewardState};
use crate::updates::{self, BatchReceipt, MultiUserUpdate, SingleUserUpdate};
use crate::yield_source::YieldSource;
use crate::{Result, RewardsError};

/// How claims treat caller-supplied simulated deltas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSimulationPolicy {
    /// Apply the deltas for real before settling, exactly like a signed update.
    #[default]
    Apply,
    /// Refuse claims that carry simulated deltas.
    Reject,
}

/// Identity and block of the caller of a mutating operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub block: BlockNumber,
}

impl CallContext {
    pub fn new(caller: Address, block: BlockNumber) -> Self {
        Self { caller, block }
    }
}

/// Construction parameters.
#[derive(Clone, Debug)]
pub struct ControllerParams {
    /// Principal allowed to run admin operations.
    pub admin: Address,
    /// Key whose signatures authorize balance updates.
    pub authorized_updater: VerifyingKey,
    /// Deployment identifier bound into every signed batch.
    pub domain: [u8; 32],
    pub claim_simulations: ClaimSimulationPolicy,
}

pub struct RewardsController<O, Y> {
    admin: Address,
    authorized_updater: VerifyingKey,
    domain: [u8; 32],
    claim_simulations: ClaimSimulationPolicy,
    registry: CollectionRegistry,
    store: RewardStateStore,
    nonces: NonceRegistry,
    index: GlobalIndexTracker,
    events: EventLog,
    oracle: O,
    yield_source: Y,
}

impl<O: ExchangeRateOracle, Y: YieldSource> RewardsController<O, Y> {
    /// Create a controller and seed the global index from the oracle.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidConfig`] if the admin, updater or domain is zero
    /// - [`RewardsError::Oracle`] if the initial rate cannot be read
    pub fn new(params: ControllerParams, oracle: O, yield_source: Y) -> Result<Self> {
        if is_zero_address(&params.admin) {
            return Err(TypesError::ZeroAddress("admin").into());
        }
        if params.authorized_updater.as_bytes() == &ZERO_ADDRESS {
            return Err(TypesError::ZeroAddress("authorized updater").into());
        }
        if params.domain == ZERO_ADDRESS {
            return Err(TypesError::ZeroAddress("deployment domain").into());
        }

        let mut index = GlobalIndexTracker::new();
        let initial = index.observe(&oracle)?;
        index.commit(initial);

        tracing::info!(
            admin = %hex::encode(params.admin),
            updater = %params.authorized_updater.to_hex(),
            domain = %hex::encode(params.domain),
            index = %initial,
            claim_simulations = ?params.claim_simulations,
            "rewards controller initialized"
        );

        Ok(Self {
            admin: params.admin,
            authorized_updater: params.authorized_updater,
            domain: params.domain,
            claim_simulations: params.claim_simulations,
            registry: CollectionRegistry::new(),
            store: RewardStateStore::new(),
            nonces: NonceRegistry::new(),
            index,
            events: EventLog::new(),
            oracle,
            yield_source,
        })
    }

    // Queries

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn authorized_updater(&self) -> &VerifyingKey {
        &self.authorized_updater
    }

    pub fn domain(&self) -> &[u8; 32] {
        &self.domain
    }

    pub fn claim_simulation_policy(&self) -> ClaimSimulationPolicy {
        self.claim_simulations
    }

    /// Reward state of a pair; all-zero if never touched.
    pub fn user_state(&self, user: &Address, collection: &CollectionId) -> UserRewardState {
        self.store.get(&PairKey::new(*user, *collection))
    }

    /// Collections where the user currently holds NFTs or balance.
    pub fn active_collections(&self, user: &Address) -> Vec<CollectionId> {
        self.store.active_collections(user)
    }

    pub fn collection(&self, collection: &CollectionId) -> Option<&CollectionConfig> {
        self.registry.get(collection)
    }

    pub fn whitelisted_collections(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.registry.whitelisted_collections()
    }

    /// The nonce the signer's next batch must carry.
    pub fn nonce(&self, signer: &VerifyingKey) -> u64 {
        self.nonces.current(signer)
    }

    /// The last persisted global index.
    pub fn stored_index(&self) -> u128 {
        self.index.stored()
    }

    /// The index the next operation would use. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Oracle`] or [`RewardsError::IndexRegression`]
    pub fn current_index(&self) -> Result<u128> {
        self.index.observe(&self.oracle)
    }

    pub fn events(&self) -> &[EventRecord] {
        self.events.records()
    }

    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        self.events.drain()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn yield_source(&self) -> &Y {
        &self.yield_source
    }

    pub fn yield_source_mut(&mut self) -> &mut Y {
        &mut self.yield_source
    }

    // Administration

    fn require_admin(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller != self.admin {
            tracing::warn!(caller = %hex::encode(ctx.caller), "unauthorized admin call");
            return Err(RewardsError::Unauthorized(ctx.caller));
        }
        Ok(())
    }

    /// Whitelist a collection.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the caller is not the admin
    /// - [`RewardsError::AlreadyWhitelisted`] if the collection is whitelisted
    /// - [`RewardsError::InvalidConfig`] if the share is out of range
    pub fn add_collection(&mut self, ctx: &CallContext, config: CollectionConfig) -> Result<()> {
        self.require_admin(ctx)?;
        let event = RewardsEvent::CollectionWhitelisted {
            collection: config.collection,
            beta: config.beta,
            share_bps: config.share_bps,
        };
        self.registry.add(config)?;
        tracing::info!(event = event.name(), "collection whitelisted");
        self.events.emit(ctx.block, event);
        Ok(())
    }

    /// Retire a collection. Its share and beta drop to zero; existing rows
    /// are kept.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the caller is not the admin
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn remove_collection(&mut self, ctx: &CallContext, collection: &CollectionId) -> Result<()> {
        self.require_admin(ctx)?;
        self.registry.remove(collection)?;
        tracing::info!(collection = %hex::encode(collection), "collection removed");
        self.events.emit(
            ctx.block,
            RewardsEvent::CollectionRemoved {
                collection: *collection,
            },
        );
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the caller is not the admin
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn update_beta(
        &mut self,
        ctx: &CallContext,
        collection: &CollectionId,
        beta: u128,
    ) -> Result<()> {
        self.require_admin(ctx)?;
        let old_beta = self.registry.update_beta(collection, beta)?;
        tracing::info!(
            collection = %hex::encode(collection),
            old = %old_beta,
            new = %beta,
            "beta updated"
        );
        self.events.emit(
            ctx.block,
            RewardsEvent::BetaUpdated {
                collection: *collection,
                old_beta,
                new_beta: beta,
            },
        );
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the caller is not the admin
    /// - [`RewardsError::InvalidConfig`] if `share_bps` exceeds 10,000
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn update_share_percentage(
        &mut self,
        ctx: &CallContext,
        collection: &CollectionId,
        share_bps: u16,
    ) -> Result<()> {
        self.require_admin(ctx)?;
        let old_share_bps = self.registry.update_share(collection, share_bps)?;
        tracing::info!(
            collection = %hex::encode(collection),
            old = old_share_bps,
            new = share_bps,
            "share percentage updated"
        );
        self.events.emit(
            ctx.block,
            RewardsEvent::SharePercentageUpdated {
                collection: *collection,
                old_share_bps,
                new_share_bps: share_bps,
            },
        );
        Ok(())
    }

    /// Rotate the updater key. The new key starts at its own nonce.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the caller is not the admin
    /// - [`RewardsError::InvalidConfig`] if the key is all zeroes
    pub fn set_authorized_updater(
        &mut self,
        ctx: &CallContext,
        updater: VerifyingKey,
    ) -> Result<()> {
        self.require_admin(ctx)?;
        if updater.as_bytes() == &ZERO_ADDRESS {
            return Err(TypesError::ZeroAddress("authorized updater").into());
        }
        let old = std::mem::replace(&mut self.authorized_updater, updater);
        tracing::info!(
            old = %old.to_hex(),
            new = %self.authorized_updater.to_hex(),
            "authorized updater changed"
        );
        self.events.emit(
            ctx.block,
            RewardsEvent::AuthorizedUpdaterChanged {
                old_updater: old.to_bytes(),
                new_updater: self.authorized_updater.to_bytes(),
            },
        );
        Ok(())
    }

    // Balance updates

    fn authorize(&self, signer: &VerifyingKey, nonce: u64) -> Result<()> {
        if signer != &self.authorized_updater {
            return Err(RewardsError::SignerMismatch {
                expected: self.authorized_updater.to_bytes(),
                actual: signer.to_bytes(),
            });
        }
        self.nonces.check(signer, nonce)
    }

    /// Apply a signed batch of deltas for one user.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::EmptyBatch`] if there are no deltas
    /// - [`RewardsError::SignerMismatch`], [`RewardsError::StaleNonce`] or
    ///   [`RewardsError::InvalidSignature`] if authorization fails
    /// - any per-delta error; the whole batch is then discarded
    pub fn apply_single_user_batch(
        &mut self,
        signer: &VerifyingKey,
        update: &SingleUserUpdate,
        nonce: u64,
        signature: &Signature,
    ) -> Result<BatchReceipt> {
        update.validate()?;
        self.authorize(signer, nonce)?;
        update.verify(signer, &self.domain, nonce, signature)?;

        self.commit_batch(
            signer,
            vec![update.user],
            &update.deltas,
            update.entries(),
        )
    }

    /// Apply a signed batch where `users[i]` receives `deltas[i]`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::EmptyBatch`] or [`RewardsError::BatchLengthMismatch`]
    /// - [`RewardsError::SignerMismatch`], [`RewardsError::StaleNonce`] or
    ///   [`RewardsError::InvalidSignature`] if authorization fails
    /// - any per-delta error; the whole batch is then discarded
    pub fn apply_multi_user_batch(
        &mut self,
        signer: &VerifyingKey,
        update: &MultiUserUpdate,
        nonce: u64,
        signature: &Signature,
    ) -> Result<BatchReceipt> {
        update.validate()?;
        self.authorize(signer, nonce)?;
        update.verify(signer, &self.domain, nonce, signature)?;

        self.commit_batch(
            signer,
            update.users.clone(),
            &update.deltas,
            update.entries(),
        )
    }

    fn commit_batch<'e>(
        &mut self,
        signer: &VerifyingKey,
        users: Vec<Address>,
        deltas: &[BalanceUpdateDelta],
        entries: impl Iterator<Item = (&'e Address, &'e BalanceUpdateDelta)>,
    ) -> Result<BatchReceipt> {
        let current_index = self.index.observe(&self.oracle)?;

        let mut staged = StagedState::new(&self.store);
        let distinct_users =
            updates::apply_entries(&mut staged, &self.registry, current_index, entries)?;
        let changes = staged.into_changes();

        let nonce = self.nonces.advance(signer)?;
        self.store.commit(changes);
        self.index.commit(current_index);

        let block = deltas.iter().map(|delta| delta.block).max().unwrap_or_default();
        tracing::info!(
            signer = %signer.to_hex(),
            nonce,
            entries = deltas.len(),
            users = distinct_users,
            index = %current_index,
            "balance updates processed"
        );
        self.events.emit(
            block,
            RewardsEvent::BalanceUpdatesProcessed {
                signer: signer.to_bytes(),
                users,
                nonce,
                entries: deltas.len(),
            },
        );

        Ok(BatchReceipt {
            nonce,
            entries: deltas.len(),
            users: distinct_users,
        })
    }

    // Preview

    /// Project the user's rewards over `collections`, as if `simulated` had
    /// been applied. Never mutates anything.
    ///
    /// # Errors
    ///
    /// See [`preview::project`]; oracle failures and index regressions
    /// propagate.
    pub fn preview_rewards(
        &self,
        user: &Address,
        collections: &[CollectionId],
        simulated: &[BalanceUpdateDelta],
    ) -> Result<RewardPreview> {
        let current_index = self.index.observe(&self.oracle)?;
        preview::project(
            &self.store,
            &self.registry,
            current_index,
            user,
            collections,
            simulated,
        )
    }

    // Claims

    fn check_claim_simulations(
        &self,
        requested: Option<&BTreeSet<CollectionId>>,
        simulated: &[BalanceUpdateDelta],
    ) -> Result<()> {
        if !simulated.is_empty() && self.claim_simulations == ClaimSimulationPolicy::Reject {
            return Err(RewardsError::SimulationRejected);
        }
        preview::check_simulations(requested, simulated)
    }

    /// Claim the caller's rewards from one collection. Returns the amount
    /// paid, which may be below what was due.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    /// - [`RewardsError::SimulationRejected`] if simulated deltas are supplied
    ///   under [`ClaimSimulationPolicy::Reject`]
    /// - [`RewardsError::UnrequestedSimulation`] or
    ///   [`RewardsError::UnsortedSimulation`] for malformed simulated deltas
    /// - oracle, yield source and per-delta errors
    pub fn claim_rewards_for_collection(
        &mut self,
        ctx: &CallContext,
        collection: &CollectionId,
        simulated: &[BalanceUpdateDelta],
    ) -> Result<Amount> {
        self.registry.whitelisted(collection)?;
        let requested = BTreeSet::from([*collection]);
        self.check_claim_simulations(Some(&requested), simulated)?;

        self.settle_and_pay(
            ctx,
            &[*collection],
            simulated,
            ClaimTarget::Collection {
                collection: *collection,
            },
        )
    }

    /// Claim the caller's rewards from every active whitelisted collection,
    /// every collection named by `simulated`, and every whitelisted
    /// collection still carrying an unpaid reward.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::NoRewards`] if there is nothing to claim against
    /// - [`RewardsError::SimulationRejected`] if simulated deltas are supplied
    ///   under [`ClaimSimulationPolicy::Reject`]
    /// - [`RewardsError::NotWhitelisted`] if a simulated delta names a
    ///   collection that is not whitelisted
    /// - oracle, yield source and per-delta errors
    pub fn claim_rewards_for_all(
        &mut self,
        ctx: &CallContext,
        simulated: &[BalanceUpdateDelta],
    ) -> Result<Amount> {
        self.check_claim_simulations(None, simulated)?;

        let user = ctx.caller;
        let mut targets: BTreeSet<CollectionId> = self
            .store
            .active_collections(&user)
            .into_iter()
            .chain(self.store.collections_with_deficit(&user))
            .filter(|collection| self.registry.is_whitelisted(collection))
            .collect();
        for delta in simulated {
            self.registry.whitelisted(&delta.collection)?;
            targets.insert(delta.collection);
        }
        if targets.is_empty() {
            return Err(RewardsError::NoRewards);
        }

        let targets: Vec<CollectionId> = targets.into_iter().collect();
        self.settle_and_pay(ctx, &targets, simulated, ClaimTarget::All)
    }

    fn settle_and_pay(
        &mut self,
        ctx: &CallContext,
        targets: &[CollectionId],
        simulated: &[BalanceUpdateDelta],
        target: ClaimTarget,
    ) -> Result<Amount> {
        let current_index = self.index.observe(&self.oracle)?;
        let user = ctx.caller;

        let mut staged = StagedState::new(&self.store);
        let outcome: ClaimOutcome = claims::settle_claim(
            &mut staged,
            &self.registry,
            &mut self.yield_source,
            current_index,
            ClaimRequest {
                user: &user,
                block: ctx.block,
                targets,
                simulated,
            },
        )?;
        let changes = staged.into_changes();

        self.store.commit(changes);
        self.index.commit(current_index);

        tracing::info!(
            user = %hex::encode(user),
            collections = outcome.settled,
            due = %outcome.due,
            paid = %outcome.paid,
            "rewards claimed"
        );
        self.events.emit(
            ctx.block,
            RewardsEvent::RewardsClaimed {
                user,
                target: target.clone(),
                amount: outcome.paid,
            },
        );
        if outcome.is_capped() {
            tracing::warn!(
                user = %hex::encode(user),
                due = %outcome.due,
                received = %outcome.paid,
                deficit = %(outcome.due - outcome.paid),
                "claim capped by yield source"
            );
            self.events.emit(
                ctx.block,
                RewardsEvent::RewardClaimCapped {
                    user,
                    target,
                    due: outcome.due,
                    received: outcome.paid,
                },
            );
        }

        if outcome.excess > 0 {
            tracing::warn!(
                user = %hex::encode(user),
                due = %outcome.due,
                excess = %outcome.excess,
                "yield source delivered more than requested"
            );
        }

        Ok(outcome.paid)
    }
}
