//! CLI flags applied over loaded configuration: the highest-precedence layer.

use super::parse::{ClientCli, HubCli, LogArgs};
use crate::config::RoomsyncConfig;
use crate::logging::LoggingConfig;

impl LogArgs {
    pub fn apply(&self, config: &mut LoggingConfig) {
        if self.quiet {
            config.enabled = false;
        }
        if self.verbose {
            config.level = "debug".to_string();
            // Keep verbose output visible in the terminal; an explicit
            // --log-output still wins below.
            if config.output == "file" {
                config.output = "file+stderr".to_string();
            }
        }
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
    }
}

impl HubCli {
    pub fn apply(&self, config: &mut RoomsyncConfig) {
        if let Some(bind) = &self.bind {
            config.hub.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.hub.port = port;
        }
        if let Some(key) = &self.developer_key {
            config.hub.developer_key = key.clone();
        }
        if let Some(room) = &self.room {
            config.hub.default_room = Some(room.clone());
        }
        self.log.apply(&mut config.logging);
    }
}

impl ClientCli {
    pub fn apply(&self, config: &mut RoomsyncConfig) {
        if let Some(room) = &self.room {
            config.client.room = room.clone();
        }
        if let Some(host) = &self.host {
            config.client.host = host.clone();
        }
        if let Some(port) = self.port {
            config.client.port = port;
        }
        if let Some(workspace) = &self.workspace {
            config.client.workspace = workspace.clone();
        }
        if let Some(key) = &self.developer_key {
            config.client.developer_key = Some(key.clone());
        }
        if let Some(interval) = self.scan_interval_ms {
            config.client.scan_interval_ms = interval;
        }
        if self.rebind {
            config.client.rebind = true;
        }
        self.log.apply(&mut config.logging);
    }
}
