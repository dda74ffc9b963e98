//! Roomsync Hub Binary
//!
//! Listens for source and replica connections and relays one room.

use anyhow::Context;
use clap::Parser;
use roomsync::cli::HubCli;
use roomsync::config::{self, ConfigLoader, RoomsyncConfig};
use roomsync::hub::Hub;
use roomsync::logging::init_logging;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = HubCli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Roomsync hub starting");

    if let Err(e) = run(config) {
        error!(error = %format!("{:#}", e), "Hub stopped");
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

/// Defaults, config files and environment, then CLI flags on top
fn load_config(cli: &HubCli) -> anyhow::Result<RoomsyncConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config
        .validate_hub()
        .map_err(config::validation_failure)?;
    Ok(config)
}

fn run(config: RoomsyncConfig) -> anyhow::Result<()> {
    let address = format!("{}:{}", config.hub.bind, config.hub.port);
    let hub = Hub::bind(config.hub).with_context(|| format!("Failed to listen on {}", address))?;
    hub.serve().context("Accept loop failed")?;
    Ok(())
}
