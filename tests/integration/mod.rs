//! Integration tests for roomsync

mod binaries;
mod config_layers;
mod hub_end_to_end;
mod region_merge;
mod scanner_changes;
mod tree_roundtrip;
mod writeback;
