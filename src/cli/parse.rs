//! CLI parse: clap types for the hub and client binaries. No behavior; definitions only.

use clap::{Args, Parser};
use std::path::PathBuf;

/// Logging flags shared by both binaries
#[derive(Args, Debug, Clone, Default)]
pub struct LogArgs {
    /// Enable verbose logging (debug level)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Roomsync hub - relays one room's workspace from its source to replicas
#[derive(Parser, Debug)]
#[command(name = "roomsync-hub")]
#[command(version, about = "Relay a shared workspace from one source to many replicas")]
pub struct HubCli {
    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Shared secret identifying the source
    #[arg(long)]
    pub developer_key: Option<String>,

    /// Room accepted for replicas before a source connects
    #[arg(long)]
    pub room: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Roomsync client - share a workspace as source or mirror it as replica
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(version, about = "Share or mirror a workspace through a roomsync hub")]
pub struct ClientCli {
    /// Room to join
    pub room: Option<String>,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Hub host name or address
    #[arg(long)]
    pub host: Option<String>,

    /// Hub port
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Workspace directory to share or mirror
    #[arg(long, short = 'w')]
    pub workspace: Option<PathBuf>,

    /// Join as the room's source using this key
    #[arg(long)]
    pub developer_key: Option<String>,

    /// Milliseconds between workspace scans
    #[arg(long)]
    pub scan_interval_ms: Option<u64>,

    /// Rebind a workspace that belongs to another room
    #[arg(long)]
    pub rebind: bool,

    #[command(flatten)]
    pub log: LogArgs,
}
