//! Workspace Tree
//!
//! Directories and files keyed by their workspace path (`/`, `/src/`,
//! `/src/Main.java`), the changesets moving one tree state to another, and
//! the filesystem walk that produces them.

pub mod changeset;
pub mod hasher;
pub mod path;
pub mod repository;
pub mod walker;

pub use changeset::{Changeset, FileEntry};
pub use repository::Repository;
