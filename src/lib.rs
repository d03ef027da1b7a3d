//! Recursive change detection below a directory.
//!
//! A [`LocalWatch`] mirrors the watched tree in memory, turns native
//! filesystem events into reconciliation cycles and hands back batches of
//! [`Diff`]s: `update` for files that appeared or changed, `delete` for files
//! that went away.

#![allow(clippy::enum_variant_names)]

pub mod config;
pub mod engine;
pub mod ext;
pub mod filesystem;
pub mod filter;
pub mod walker;
pub mod watching;

pub use engine::{LocalWatch, LocalWatchBuilder, WatchError, WatchOptions};
pub use filesystem::{Diff, DiffKind};
