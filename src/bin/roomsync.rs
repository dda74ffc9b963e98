//! Roomsync Client Binary
//!
//! Shares a workspace as the room's source (with a developer key) or
//! mirrors it as a replica.

use anyhow::Context;
use clap::Parser;
use roomsync::cli::ClientCli;
use roomsync::client::Client;
use roomsync::config::{self, ConfigLoader, RoomsyncConfig};
use roomsync::logging::init_logging;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = ClientCli::parse();

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

    info!(version = env!("CARGO_PKG_VERSION"), "Roomsync client starting");

    if let Err(e) = run(config) {
        error!(error = %format!("{:#}", e), "Client stopped");
        eprintln!("{:#}", e);
        process::exit(1);
    }
}

/// Defaults, config files and environment, then CLI flags on top
fn load_config(cli: &ClientCli) -> anyhow::Result<RoomsyncConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config
        .validate_client()
        .map_err(config::validation_failure)?;
    Ok(config)
}

fn run(config: RoomsyncConfig) -> anyhow::Result<()> {
    let workspace = config.client.workspace.clone();
    let mut client = Client::new(config.client)
        .with_context(|| format!("Cannot use workspace {}", workspace.display()))?;
    client.run();
    Ok(())
}
