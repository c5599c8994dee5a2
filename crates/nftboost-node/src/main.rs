//! nftboost-node: replays balance-update and claim scripts against an
//! in-process rewards controller.
//!
//! Usage: `nftboost-node [CONFIG] [SCRIPT]`. The config path may also come
//! from `NFTBOOST_CONFIG`; the script is read from stdin when no path is
//! given. Results and events are printed to stdout as JSON lines; logs go to
//! stderr.

mod config;
mod script;

use std::io::{Read, Write};
use std::path::PathBuf;

use tracing::info;

use nftboost_oracle::stub::StubOracle;
use nftboost_rewards::{CallContext, ControllerParams, ReserveYieldSource, RewardsController};

use crate::config::NodeConfig;
use crate::script::{NodeController, Replayer};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let script_path = args.next().map(PathBuf::from);

    // 1. Load config
    let config = NodeConfig::load(config_path.as_deref())?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    info!("nftboost node starting");

    // 3. Build the controller
    let updater = config.updater_key()?;
    let mut controller = build_controller(&config, &updater)?;
    info!(
        updater = %updater.verifying_key().to_hex(),
        collections = config.collections.len(),
        "controller ready"
    );

    // 4. Read the script
    let content = match script_path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let steps = script::parse(&content)?;

    // 5. Replay, after the events from startup whitelisting
    let mut stdout = std::io::stdout().lock();
    for record in controller.drain_events() {
        writeln!(stdout, "{}", serde_json::json!({ "event": record }))?;
    }
    let lines = Replayer::new(&mut controller, &updater).run(&steps);
    for line in lines {
        writeln!(stdout, "{line}")?;
    }

    info!(steps = steps.len(), "replay finished");
    Ok(())
}

fn build_controller(
    config: &NodeConfig,
    updater: &nftboost_crypto::ed25519::SigningKey,
) -> anyhow::Result<NodeController> {
    let params = ControllerParams {
        admin: config.controller.admin,
        authorized_updater: updater.verifying_key(),
        domain: config.domain(),
        claim_simulations: config.controller.claim_simulations,
    };
    let oracle =
        StubOracle::with_rate_and_decimals(config.oracle.initial_rate, config.oracle.rate_decimals);
    let yield_source = ReserveYieldSource::new(config.yield_source.reserve);
    let mut controller = RewardsController::new(params, oracle, yield_source)?;

    let ctx = CallContext::new(config.controller.admin, 0);
    for collection in config.collection_configs()? {
        controller.add_collection(&ctx, collection)?;
    }
    Ok(controller)
}
