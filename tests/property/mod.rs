//! Property-based tests

mod checksum;
mod merge;
mod tree_diff;
