//! Roomsync: Room-Based Workspace Replication
//!
//! One source shares a directory tree through a hub; any number of replicas
//! in the same room mirror it. Lines between `// <USER CODE>` and
//! `// </USER CODE>` markers stay owned by each replica and are reported
//! back to the source.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod ignore;
pub mod logging;
pub mod merge;
pub mod protocol;
pub mod scanner;
pub mod tree;
pub mod types;
