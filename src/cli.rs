//! CLI domain: argument parsing and flag overrides for both binaries.

mod overrides;
mod parse;

pub use parse::{ClientCli, HubCli, LogArgs};
