//! Configuration System
//!
//! Layered configuration for the hub and the client. Sources, lowest to
//! highest precedence: built-in defaults, the global config file, an explicit
//! `--config` file, `ROOMSYNC__SECTION__KEY` environment variables. CLI flags
//! are applied on top by the binaries.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::protocol::{UserCodeLimits, MAX_LINE_BYTES};
use crate::tree::walker::{default_text_extensions, WalkerConfig};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

pub const DEFAULT_PORT: u16 = 24112;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomsyncConfig {
    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hub settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address to listen on
    pub bind: String,
    pub port: u16,
    /// Shared secret a source prefixes to its room on connect
    pub developer_key: String,
    /// Room accepted for replicas before any source has connected
    pub default_room: Option<String>,
    /// Capacity of the hub-wide intake queue
    pub intake_capacity: usize,
    /// Capacity of each session's outbound queue
    pub outbound_capacity: usize,
    /// How long a send may wait for outbound queue space
    pub send_timeout_ms: u64,
    pub idle_timeout_secs: u64,
    /// Longest inbound line accepted
    pub max_line_bytes: usize,
    pub max_user_code_entries: usize,
    pub max_user_code_length: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            developer_key: String::new(),
            default_room: None,
            intake_capacity: 10_000,
            outbound_capacity: 500,
            send_timeout_ms: 5_000,
            idle_timeout_secs: 1_200,
            max_line_bytes: MAX_LINE_BYTES,
            max_user_code_entries: 10,
            max_user_code_length: 5_000,
        }
    }
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn user_code_limits(&self) -> UserCodeLimits {
        UserCodeLimits {
            max_entries: self.max_user_code_entries,
            max_length: self.max_user_code_length,
        }
    }

    /// Validate hub settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.developer_key.is_empty() {
            errors.push("developer_key must not be empty".to_string());
        }
        if self.bind.trim().is_empty() {
            errors.push("bind address must not be empty".to_string());
        }
        if self.intake_capacity == 0 {
            errors.push("intake_capacity must be greater than 0".to_string());
        }
        if self.outbound_capacity == 0 {
            errors.push("outbound_capacity must be greater than 0".to_string());
        }
        if self.send_timeout_ms == 0 {
            errors.push("send_timeout_ms must be greater than 0".to_string());
        }
        if self.idle_timeout_secs == 0 {
            errors.push("idle_timeout_secs must be greater than 0".to_string());
        }
        if self.max_line_bytes == 0 {
            errors.push("max_line_bytes must be greater than 0".to_string());
        }
        if let Some(room) = &self.default_room {
            if room.is_empty() {
                errors.push("default_room must not be empty when set".to_string());
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub room: String,
    /// Present for the source role
    pub developer_key: Option<String>,
    /// Local directory being shared or mirrored
    pub workspace: PathBuf,
    pub scan_interval_ms: u64,
    /// Cool-down between connection attempts
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_file_size: u64,
    pub text_only: bool,
    pub text_extensions: Vec<String>,
    /// Files a replica writes only if they do not exist yet
    pub sync_once: Vec<String>,
    /// Take over a workspace bound to another room, or with an empty marker
    pub rebind: bool,
    /// Re-read written files and compare their hash with the announced one
    pub verify_after_write: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            room: String::new(),
            developer_key: None,
            workspace: PathBuf::from("."),
            scan_interval_ms: 500,
            reconnect_delay_ms: 5_000,
            connect_timeout_ms: 3_000,
            max_file_size: 1024 * 1024,
            text_only: true,
            text_extensions: default_text_extensions(),
            sync_once: default_sync_once(),
            rebind: false,
            verify_after_write: true,
        }
    }
}

fn default_sync_once() -> Vec<String> {
    [
        "/Project/.idea/misc.xml",
        "/Project/.idea/workspace.xml",
        "/Project/.idea/gradle.xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ClientConfig {
    /// A configured developer key makes this client the room's source
    pub fn role(&self) -> Role {
        match self.developer_key.as_deref() {
            Some(key) if !key.is_empty() => Role::Source,
            _ => Role::Replica,
        }
    }

    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            max_file_size: self.max_file_size,
            text_only: self.text_only,
            text_extensions: self.text_extensions.clone(),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate client settings
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push("host must not be empty".to_string());
        }
        if self.port == 0 {
            errors.push("port must not be 0".to_string());
        }
        if self.room.is_empty() {
            errors.push("room must not be empty".to_string());
        }
        if self.scan_interval_ms == 0 {
            errors.push("scan_interval_ms must be greater than 0".to_string());
        }
        if self.connect_timeout_ms == 0 {
            errors.push("connect_timeout_ms must be greater than 0".to_string());
        }
        if self.max_file_size == 0 {
            errors.push("max_file_size must be greater than 0".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Hub(String),
    Client(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Hub(msg) => write!(f, "Hub: {}", msg),
            ValidationError::Client(msg) => write!(f, "Client: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RoomsyncConfig {
    /// Validate the sections the hub binary uses
    pub fn validate_hub(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(hub_errors) = self.hub.validate() {
            errors.extend(hub_errors.into_iter().map(ValidationError::Hub));
        }
        self.collect_logging_errors(&mut errors);
        finish(errors)
    }

    /// Validate the sections the client binary uses
    pub fn validate_client(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(client_errors) = self.client.validate() {
            errors.extend(client_errors.into_iter().map(ValidationError::Client));
        }
        self.collect_logging_errors(&mut errors);
        finish(errors)
    }

    fn collect_logging_errors(&self, errors: &mut Vec<ValidationError>) {
        if let Err(e) = crate::logging::validate(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Join validation errors into one [`ConfigError::Invalid`]
pub fn validation_failure(errors: Vec<ValidationError>) -> ConfigError {
    let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    ConfigError::Invalid(lines.join("\n"))
}
