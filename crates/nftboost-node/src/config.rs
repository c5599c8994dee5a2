//! Node configuration.
//!
//! Loaded from a TOML file whose path is the first command-line argument or
//! the `NFTBOOST_CONFIG` environment variable. Every section is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use nftboost_crypto::blake3::deployment_domain;
use nftboost_crypto::ed25519::SigningKey;
use nftboost_rewards::ClaimSimulationPolicy;
use nftboost_types::collection::{CollectionConfig, RewardBasis};
use nftboost_types::{Address, CollectionId, PRECISION};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "NFTBOOST_CONFIG";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub updater: UpdaterConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub yield_source: YieldSourceConfig,
    /// Collections whitelisted at startup.
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Admin principal (hex).
    #[serde_as(as = "serde_with::hex::Hex")]
    #[serde(default = "default_admin")]
    pub admin: Address,
    /// Deployment name; hashed into the domain bound into signed batches.
    #[serde(default = "default_deployment")]
    pub deployment: String,
    /// How claims treat simulated deltas: "apply" | "reject".
    #[serde(default)]
    pub claim_simulations: ClaimSimulationPolicy,
}

/// Authorized updater settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Hex Ed25519 secret key used to sign scripted updates. Empty = generate
    /// an ephemeral key at startup.
    #[serde(default)]
    pub signing_key: String,
}

/// Stub oracle settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Initial exchange rate, scaled by `10^rate_decimals`.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    #[serde(default = "default_rate")]
    pub initial_rate: u128,
    #[serde(default = "default_rate_decimals")]
    pub rate_decimals: u32,
}

/// Reserve yield source settings.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YieldSourceConfig {
    /// Initial reserve.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    #[serde(default)]
    pub reserve: u128,
}

/// One whitelisted collection.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub collection: CollectionId,
    /// Boost per NFT in `PRECISION` units.
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub beta: u128,
    pub reward_basis: RewardBasis,
    pub share_bps: u16,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_admin() -> Address {
    [0xAD; 32]
}

fn default_deployment() -> String {
    "local".to_string()
}

fn default_rate() -> u128 {
    PRECISION
}

fn default_rate_decimals() -> u32 {
    18
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            deployment: default_deployment(),
            claim_simulations: ClaimSimulationPolicy::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            initial_rate: default_rate(),
            rate_decimals: default_rate_decimals(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from `path`, or from the path in
    /// `NFTBOOST_CONFIG` when `path` is `None`.
    ///
    /// Falls back to defaults if no path is given or the file does not exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                Self::parse(&content)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Domain bound into every signed batch of this deployment.
    pub fn domain(&self) -> [u8; 32] {
        deployment_domain(&self.controller.deployment)
    }

    /// The configured updater key, or a fresh one if none is set.
    pub fn updater_key(&self) -> anyhow::Result<SigningKey> {
        if self.updater.signing_key.is_empty() {
            return Ok(SigningKey::generate());
        }
        Ok(SigningKey::from_hex(&self.updater.signing_key)?)
    }

    /// Validated startup collections.
    pub fn collection_configs(&self) -> anyhow::Result<Vec<CollectionConfig>> {
        self.collections
            .iter()
            .map(|entry| -> anyhow::Result<CollectionConfig> {
                Ok(CollectionConfig::new(
                    entry.collection,
                    entry.beta,
                    entry.reward_basis,
                    entry.share_bps,
                )?)
            })
            .collect()
    }
}
