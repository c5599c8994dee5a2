//! Balance-update deltas.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{BlockNumber, CollectionId};

/// A signed change to one (user, collection) pair's tracked position,
/// effective at `block`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdateDelta {
    /// Collection the delta applies to.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub collection: CollectionId,
    /// Block at which the change takes effect.
    pub block: BlockNumber,
    /// Change in held NFT count.
    pub nft_delta: i64,
    /// Change in tracked deposit-equivalent balance, as a decimal string on
    /// the wire.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub balance_delta: i128,
}

impl BalanceUpdateDelta {
    pub fn new(
        collection: CollectionId,
        block: BlockNumber,
        nft_delta: i64,
        balance_delta: i128,
    ) -> Self {
        Self {
            collection,
            block,
            nft_delta,
            balance_delta,
        }
    }
}
