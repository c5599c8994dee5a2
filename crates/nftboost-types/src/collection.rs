//! Whitelisted collection configuration.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{is_zero_address, CollectionId, Result, TypesError, BPS_DENOMINATOR};

/// Which side of the lending market a collection's tracked balance follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardBasis {
    /// Balance tracks the holder's borrow position.
    Borrow,
    /// Balance tracks the holder's deposit position.
    Deposit,
}

/// Reward parameters for one NFT collection.
///
/// Constructed through [`CollectionConfig::new`] so that the share percentage
/// and collection address are validated at the boundary where they are set.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection contract address.
    #[serde_as(as = "serde_with::hex::Hex")]
    pub collection: CollectionId,
    /// Boost added per held NFT, in `PRECISION` units.
    pub beta: u128,
    /// Borrow- or deposit-side reward basis.
    pub reward_basis: RewardBasis,
    /// Share of yield allocated to this collection, in basis points.
    pub share_bps: u16,
    /// Whether the collection currently earns rewards.
    pub whitelisted: bool,
}

impl CollectionConfig {
    /// Create a whitelisted collection configuration.
    ///
    /// # Errors
    ///
    /// - [`TypesError::ZeroAddress`] if `collection` is the zero address
    /// - [`TypesError::ShareOutOfRange`] if `share_bps` exceeds 10,000
    pub fn new(
        collection: CollectionId,
        beta: u128,
        reward_basis: RewardBasis,
        share_bps: u16,
    ) -> Result<Self> {
        if is_zero_address(&collection) {
            return Err(TypesError::ZeroAddress("collection"));
        }
        validate_share_bps(share_bps)?;
        Ok(Self {
            collection,
            beta,
            reward_basis,
            share_bps,
            whitelisted: true,
        })
    }

    /// Zero the economic parameters and drop the collection from the whitelist.
    pub fn retire(&mut self) {
        self.beta = 0;
        self.share_bps = 0;
        self.whitelisted = false;
    }
}

/// Validate a share percentage in basis points.
///
/// # Errors
///
/// - [`TypesError::ShareOutOfRange`] if `share_bps` exceeds 10,000
pub fn validate_share_bps(share_bps: u16) -> Result<()> {
    if share_bps > BPS_DENOMINATOR {
        return Err(TypesError::ShareOutOfRange(share_bps));
    }
    Ok(())
}
