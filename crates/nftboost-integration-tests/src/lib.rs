//! Integration test crate for nftboost.
//!
//! The library only holds the shared [`Harness`]; the scenarios live under
//! `tests/` and drive a full `RewardsController` over the stub oracle and
//! the reserve yield source.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p nftboost-integration-tests
//! ```

use nftboost_crypto::blake3::deployment_domain;
use nftboost_crypto::ed25519::SigningKey;
use nftboost_oracle::stub::StubOracle;
use nftboost_rewards::{
    BatchReceipt, CallContext, ClaimSimulationPolicy, ControllerParams, MultiUserUpdate,
    ReserveYieldSource, Result, RewardsController, SingleUserUpdate,
};
use nftboost_types::collection::{CollectionConfig, RewardBasis};
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::{Address, Amount, BlockNumber, CollectionId, PRECISION};

/// One whole token (18 decimals).
pub const UNIT: u128 = PRECISION;

pub const ADMIN: Address = [0xAD; 32];
pub const ALICE: Address = [0xA1; 32];
pub const BOB: Address = [0xB0; 32];

pub const PUNKS: CollectionId = [0xC1; 32];
pub const APES: CollectionId = [0xC2; 32];

/// Deployment name hashed into the signing domain.
pub const DEPLOYMENT: &str = "integration";

pub type TestController = RewardsController<StubOracle, ReserveYieldSource>;

/// A controller plus the updater key that signs its batches.
pub struct Harness {
    pub controller: TestController,
    pub updater: SigningKey,
}

impl Harness {
    /// Controller at index 1.0 with an empty reserve and PUNKS/APES
    /// whitelisted at beta 0.1 and 50% share.
    pub fn new(policy: ClaimSimulationPolicy) -> Result<Self> {
        let updater = SigningKey::generate();
        let params = ControllerParams {
            admin: ADMIN,
            authorized_updater: updater.verifying_key(),
            domain: deployment_domain(DEPLOYMENT),
            claim_simulations: policy,
        };
        let mut controller =
            RewardsController::new(params, StubOracle::new(), ReserveYieldSource::new(0))?;
        for (collection, basis) in [(PUNKS, RewardBasis::Deposit), (APES, RewardBasis::Borrow)] {
            controller.add_collection(
                &Self::admin(0),
                CollectionConfig::new(collection, UNIT / 10, basis, 5_000)?,
            )?;
        }
        controller.drain_events();
        Ok(Self {
            controller,
            updater,
        })
    }

    pub fn admin(block: BlockNumber) -> CallContext {
        CallContext::new(ADMIN, block)
    }

    /// Sign and submit a single-user batch at the updater's current nonce.
    pub fn submit(&mut self, user: Address, deltas: Vec<BalanceUpdateDelta>) -> Result<BatchReceipt> {
        let signer = self.updater.verifying_key();
        let nonce = self.controller.nonce(&signer);
        let update = SingleUserUpdate::new(user, deltas);
        let signature = update.sign(&self.updater, self.controller.domain(), nonce);
        self.controller
            .apply_single_user_batch(&signer, &update, nonce, &signature)
    }

    /// Sign and submit a multi-user batch at the updater's current nonce.
    pub fn submit_multi(
        &mut self,
        users: Vec<Address>,
        deltas: Vec<BalanceUpdateDelta>,
    ) -> Result<BatchReceipt> {
        let signer = self.updater.verifying_key();
        let nonce = self.controller.nonce(&signer);
        let update = MultiUserUpdate::new(users, deltas);
        let signature = update.sign(&self.updater, self.controller.domain(), nonce);
        self.controller
            .apply_multi_user_batch(&signer, &update, nonce, &signature)
    }

    /// Grow the exchange rate by `bps` basis points.
    pub fn accrue_bps(&mut self, bps: u32) {
        self.controller.oracle_mut().dev_accrue_bps(bps);
    }

    pub fn fund(&mut self, amount: Amount) {
        self.controller.yield_source_mut().fund(amount);
    }

    pub fn claim(
        &mut self,
        user: Address,
        block: BlockNumber,
        collection: CollectionId,
    ) -> Result<Amount> {
        self.controller
            .claim_rewards_for_collection(&CallContext::new(user, block), &collection, &[])
    }

    pub fn claim_all(&mut self, user: Address, block: BlockNumber) -> Result<Amount> {
        self.controller
            .claim_rewards_for_all(&CallContext::new(user, block), &[])
    }
}

/// Delta adding `nfts` NFTs and `units` whole tokens at `block`.
pub fn delta(collection: CollectionId, block: BlockNumber, nfts: i64, units: i128) -> BalanceUpdateDelta {
    BalanceUpdateDelta::new(collection, block, nfts, units * UNIT as i128)
}
