//! Domain-separated BLAKE3 hashing.
//!
//! Every digest that gets signed is produced in BLAKE3's key-derivation mode
//! under a registered context string, so a signature over one kind of
//! payload can never be reinterpreted as another.

/// Registered BLAKE3 context strings. Using an unregistered context string
/// is a protocol violation.
pub mod contexts {
    pub const BALANCE_UPDATE_BATCH: &str = "NftBoost v1 balance-update-batch";
    pub const DEPLOYMENT_DOMAIN: &str = "NftBoost v1 deployment-domain";

    /// All registered context strings. Used for validation.
    pub const ALL_CONTEXTS: &[&str] = &[BALANCE_UPDATE_BATCH, DEPLOYMENT_DOMAIN];
}

/// Derive a 32-byte digest using BLAKE3's built-in key derivation mode.
///
/// # Arguments
///
/// * `context` - A registered context string (must start with "NftBoost v1 ")
/// * `key_material` - The input material
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    *hasher.finalize().as_bytes()
}

/// Derive a deployment domain identifier from a human-readable name.
///
/// The domain is bound into every signed batch so that a signature issued
/// for one deployment cannot be replayed against another.
pub fn deployment_domain(name: &str) -> [u8; 32] {
    derive_key(contexts::DEPLOYMENT_DOMAIN, name.as_bytes())
}
