//! Public entry point for loading layered configuration.

use super::merge::merge_policy;
use super::sources::{environment, explicit_file, global_file};
use super::RoomsyncConfig;
use crate::error::ConfigError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global file, the optional explicit file and the
    /// environment, in that order of precedence.
    pub fn load(explicit: Option<&Path>) -> Result<RoomsyncConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = global_file::add_to_builder(builder)?;
        if let Some(path) = explicit {
            builder = explicit_file::add_to_builder(builder, path)?;
        }
        builder = environment::add_to_builder(builder);

        let config: RoomsyncConfig = builder.build()?.try_deserialize()?;
        debug!(
            explicit = ?explicit,
            hub_port = config.hub.port,
            client_host = %config.client.host,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Load a single file over the defaults, ignoring other sources
    pub fn load_from_file(path: &Path) -> Result<RoomsyncConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = explicit_file::add_to_builder(builder, path)?;
        Ok(builder.build()?.try_deserialize()?)
    }
}
