//! Replay scripts.
//!
//! A script is a JSON array of steps. Each step runs against the controller
//! and yields one JSON line with its result or error, followed by one line
//! per event the step emitted. Failing steps do not stop the replay.
//!
//! 128-bit quantities are decimal strings; addresses are hex.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::serde_as;

use nftboost_crypto::ed25519::SigningKey;
use nftboost_oracle::stub::StubOracle;
use nftboost_rewards::{
    CallContext, MultiUserUpdate, ReserveYieldSource, RewardsController, SingleUserUpdate,
};
use nftboost_types::delta::BalanceUpdateDelta;
use nftboost_types::{Address, BlockNumber, CollectionId};

/// Controller type driven by the node.
pub type NodeController = RewardsController<StubOracle, ReserveYieldSource>;

/// One replay step.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Set the stub oracle's exchange rate.
    SetRate {
        #[serde_as(as = "serde_with::DisplayFromStr")]
        rate: u128,
    },
    /// Grow the stub oracle's rate by a number of basis points.
    AccrueBps { bps: u32 },
    /// Add to the yield reserve.
    FundYield {
        #[serde_as(as = "serde_with::DisplayFromStr")]
        amount: u128,
    },
    /// Sign and apply a single-user batch with the node's updater key.
    Update {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        deltas: Vec<BalanceUpdateDelta>,
    },
    /// Sign and apply a multi-user batch with the node's updater key.
    MultiUpdate {
        #[serde_as(as = "Vec<serde_with::hex::Hex>")]
        users: Vec<Address>,
        deltas: Vec<BalanceUpdateDelta>,
    },
    Preview {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        #[serde_as(as = "Vec<serde_with::hex::Hex>")]
        collections: Vec<CollectionId>,
        #[serde(default)]
        simulated: Vec<BalanceUpdateDelta>,
    },
    Claim {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        block: BlockNumber,
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
        #[serde(default)]
        simulated: Vec<BalanceUpdateDelta>,
    },
    ClaimAll {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        block: BlockNumber,
        #[serde(default)]
        simulated: Vec<BalanceUpdateDelta>,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetRate { .. } => "set_rate",
            Self::AccrueBps { .. } => "accrue_bps",
            Self::FundYield { .. } => "fund_yield",
            Self::Update { .. } => "update",
            Self::MultiUpdate { .. } => "multi_update",
            Self::Preview { .. } => "preview",
            Self::Claim { .. } => "claim",
            Self::ClaimAll { .. } => "claim_all",
        }
    }
}

/// Parse a script from JSON text.
pub fn parse(content: &str) -> anyhow::Result<Vec<Step>> {
    Ok(serde_json::from_str(content)?)
}

/// Replays steps against a controller, signing updates with `updater`.
pub struct Replayer<'a> {
    controller: &'a mut NodeController,
    updater: &'a SigningKey,
}

impl<'a> Replayer<'a> {
    pub fn new(controller: &'a mut NodeController, updater: &'a SigningKey) -> Self {
        Self {
            controller,
            updater,
        }
    }

    /// Run one step, returning its output lines.
    pub fn run_step(&mut self, index: usize, step: &Step) -> Vec<Value> {
        let mut lines = Vec::new();
        match self.execute(step) {
            Ok(result) => {
                tracing::debug!(step = index, op = step.name(), "step succeeded");
                lines.push(json!({ "step": index, "op": step.name(), "result": result }));
            }
            Err(e) => {
                tracing::warn!(step = index, op = step.name(), error = %e, "step failed");
                lines.push(json!({ "step": index, "op": step.name(), "error": e.to_string() }));
            }
        }
        for record in self.controller.drain_events() {
            lines.push(json!({ "step": index, "event": record }));
        }
        lines
    }

    /// Run every step in order.
    pub fn run(&mut self, steps: &[Step]) -> Vec<Value> {
        steps
            .iter()
            .enumerate()
            .flat_map(|(index, step)| self.run_step(index, step))
            .collect()
    }

    fn execute(&mut self, step: &Step) -> anyhow::Result<Value> {
        let signer = self.updater.verifying_key();
        let domain = *self.controller.domain();
        let value = match step {
            Step::SetRate { rate } => {
                self.controller.oracle_mut().dev_set_rate(*rate);
                json!({ "rate": rate.to_string() })
            }
            Step::AccrueBps { bps } => {
                let oracle = self.controller.oracle_mut();
                oracle.dev_accrue_bps(*bps);
                json!({ "rate": oracle.get_rate().to_string() })
            }
            Step::FundYield { amount } => {
                let source = self.controller.yield_source_mut();
                source.fund(*amount);
                json!({ "available": source.available().to_string() })
            }
            Step::Update { user, deltas } => {
                let update = SingleUserUpdate::new(*user, deltas.clone());
                let nonce = self.controller.nonce(&signer);
                let signature = update.sign(self.updater, &domain, nonce);
                let receipt =
                    self.controller
                        .apply_single_user_batch(&signer, &update, nonce, &signature)?;
                to_value(&receipt)?
            }
            Step::MultiUpdate { users, deltas } => {
                let update = MultiUserUpdate::new(users.clone(), deltas.clone());
                let nonce = self.controller.nonce(&signer);
                let signature = update.sign(self.updater, &domain, nonce);
                let receipt =
                    self.controller
                        .apply_multi_user_batch(&signer, &update, nonce, &signature)?;
                to_value(&receipt)?
            }
            Step::Preview {
                user,
                collections,
                simulated,
            } => to_value(&self.controller.preview_rewards(user, collections, simulated)?)?,
            Step::Claim {
                user,
                block,
                collection,
                simulated,
            } => {
                let ctx = CallContext::new(*user, *block);
                let paid =
                    self.controller
                        .claim_rewards_for_collection(&ctx, collection, simulated)?;
                json!({ "paid": paid.to_string() })
            }
            Step::ClaimAll {
                user,
                block,
                simulated,
            } => {
                let ctx = CallContext::new(*user, *block);
                let paid = self.controller.claim_rewards_for_all(&ctx, simulated)?;
                json!({ "paid": paid.to_string() })
            }
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(value: &T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}
