//! Whitelisted collection registry.
//!
//! Read by the reward engine for each collection's beta, share and basis.
//! Mutated only through the controller's admin operations. Removing a
//! collection retires it (share and beta zeroed) but keeps the record, so
//! existing reward rows keep resolving to a configuration.

use std::collections::BTreeMap;

use nftboost_types::collection::{validate_share_bps, CollectionConfig};
use nftboost_types::CollectionId;

use crate::{Result, RewardsError};

#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    collections: BTreeMap<CollectionId, CollectionConfig>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of a collection, whitelisted or not.
    pub fn get(&self, collection: &CollectionId) -> Option<&CollectionConfig> {
        self.collections.get(collection)
    }

    pub fn is_whitelisted(&self, collection: &CollectionId) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|config| config.whitelisted)
    }

    /// Configuration of a whitelisted collection.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::NotWhitelisted`] if the collection is unknown or removed
    pub fn whitelisted(&self, collection: &CollectionId) -> Result<&CollectionConfig> {
        self.collections
            .get(collection)
            .filter(|config| config.whitelisted)
            .ok_or(RewardsError::NotWhitelisted(*collection))
    }

    /// All whitelisted collections, in ascending address order.
    pub fn whitelisted_collections(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.collections.values().filter(|config| config.whitelisted)
    }

    /// Whitelist a collection. A previously removed collection may be re-added.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::AlreadyWhitelisted`] if the collection is currently whitelisted
    pub fn add(&mut self, mut config: CollectionConfig) -> Result<()> {
        if self.is_whitelisted(&config.collection) {
            return Err(RewardsError::AlreadyWhitelisted(config.collection));
        }
        validate_share_bps(config.share_bps)?;
        config.whitelisted = true;
        self.collections.insert(config.collection, config);
        Ok(())
    }

    /// Retire a collection: zero its share and beta and drop it from the whitelist.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn remove(&mut self, collection: &CollectionId) -> Result<()> {
        self.whitelisted_mut(collection)?.retire();
        Ok(())
    }

    /// Replace a collection's beta, returning the old value.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn update_beta(&mut self, collection: &CollectionId, beta: u128) -> Result<u128> {
        let config = self.whitelisted_mut(collection)?;
        Ok(std::mem::replace(&mut config.beta, beta))
    }

    /// Replace a collection's share percentage, returning the old value.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidConfig`] if `share_bps` exceeds 10,000
    /// - [`RewardsError::NotWhitelisted`] if the collection is not whitelisted
    pub fn update_share(&mut self, collection: &CollectionId, share_bps: u16) -> Result<u16> {
        validate_share_bps(share_bps)?;
        let config = self.whitelisted_mut(collection)?;
        Ok(std::mem::replace(&mut config.share_bps, share_bps))
    }

    fn whitelisted_mut(&mut self, collection: &CollectionId) -> Result<&mut CollectionConfig> {
        self.collections
            .get_mut(collection)
            .filter(|config| config.whitelisted)
            .ok_or(RewardsError::NotWhitelisted(*collection))
    }
}
