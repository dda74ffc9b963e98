//! Merge rules: built-in defaults every layer falls back to.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the scalar defaults applied.
///
/// List-valued defaults (text extensions, sync-once files) come from the
/// serde defaults on the config structs, so a file that sets them replaces
/// rather than extends them.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("hub.bind", "0.0.0.0")?
        .set_default("hub.port", i64::from(crate::config::DEFAULT_PORT))?
        .set_default("hub.intake_capacity", 10_000_i64)?
        .set_default("hub.outbound_capacity", 500_i64)?
        .set_default("hub.send_timeout_ms", 5_000_i64)?
        .set_default("hub.idle_timeout_secs", 1_200_i64)?
        .set_default("client.host", "127.0.0.1")?
        .set_default("client.port", i64::from(crate::config::DEFAULT_PORT))?
        .set_default("client.workspace", ".")?
        .set_default("client.scan_interval_ms", 500_i64)?
        .set_default("client.reconnect_delay_ms", 5_000_i64)?
        .set_default("client.connect_timeout_ms", 3_000_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
