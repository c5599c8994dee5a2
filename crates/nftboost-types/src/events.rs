//! Events emitted by the rewards controller.
//!
//! Every successful state-changing operation appends one or more events.
//! Failed operations emit nothing. 128-bit amounts serialize as decimal
//! strings.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{Address, Amount, BlockNumber, CollectionId};

/// Envelope recording where in the event stream an event landed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// Block supplied by the operation that emitted the event.
    pub block: BlockNumber,
    pub event: RewardsEvent,
}

/// What a claim was made against.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimTarget {
    /// A single collection.
    Collection {
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
    },
    /// Every active collection of the user.
    All,
}

/// All controller event types.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardsEvent {
    // Balance updates
    BalanceUpdatesProcessed {
        /// Public key of the authorized updater that signed the batch.
        #[serde_as(as = "serde_with::hex::Hex")]
        signer: [u8; 32],
        /// Users touched by the batch, in submission order.
        #[serde_as(as = "Vec<serde_with::hex::Hex>")]
        users: Vec<Address>,
        /// Nonce consumed by the batch.
        nonce: u64,
        /// Number of deltas applied.
        entries: usize,
    },

    // Claims
    RewardsClaimed {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        target: ClaimTarget,
        /// Amount actually paid out.
        #[serde_as(as = "serde_with::DisplayFromStr")]
        amount: Amount,
    },
    RewardClaimCapped {
        #[serde_as(as = "serde_with::hex::Hex")]
        user: Address,
        target: ClaimTarget,
        /// Amount owed at claim time.
        #[serde_as(as = "serde_with::DisplayFromStr")]
        due: Amount,
        /// Amount the yield source could supply.
        #[serde_as(as = "serde_with::DisplayFromStr")]
        received: Amount,
    },

    // Administration
    CollectionWhitelisted {
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
        #[serde_as(as = "serde_with::DisplayFromStr")]
        beta: u128,
        share_bps: u16,
    },
    CollectionRemoved {
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
    },
    BetaUpdated {
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
        #[serde_as(as = "serde_with::DisplayFromStr")]
        old_beta: u128,
        #[serde_as(as = "serde_with::DisplayFromStr")]
        new_beta: u128,
    },
    SharePercentageUpdated {
        #[serde_as(as = "serde_with::hex::Hex")]
        collection: CollectionId,
        old_share_bps: u16,
        new_share_bps: u16,
    },
    AuthorizedUpdaterChanged {
        #[serde_as(as = "serde_with::hex::Hex")]
        old_updater: [u8; 32],
        #[serde_as(as = "serde_with::hex::Hex")]
        new_updater: [u8; 32],
    },
}

impl RewardsEvent {
    /// Short snake_case name of the event type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BalanceUpdatesProcessed { .. } => "balance_updates_processed",
            Self::RewardsClaimed { .. } => "rewards_claimed",
            Self::RewardClaimCapped { .. } => "reward_claim_capped",
            Self::CollectionWhitelisted { .. } => "collection_whitelisted",
            Self::CollectionRemoved { .. } => "collection_removed",
            Self::BetaUpdated { .. } => "beta_updated",
            Self::SharePercentageUpdated { .. } => "share_percentage_updated",
            Self::AuthorizedUpdaterChanged { .. } => "authorized_updater_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_matches_serde_tag() {
        let event = RewardsEvent::RewardsClaimed {
            user: [1u8; 32],
            target: ClaimTarget::All,
            amount: 65,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert!(json.get(event.name()).is_some());
    }

    #[test]
    fn test_capped_event_parses_back() {
        let record = EventRecord {
            sequence: 3,
            block: 120,
            event: RewardsEvent::RewardClaimCapped {
                user: [2u8; 32],
                target: ClaimTarget::Collection {
                    collection: [9u8; 32],
                },
                due: 100,
                received: 50,
            },
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let parsed: EventRecord = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, record);
    }
}
