//! In-memory mirror of the watched directory tree.
//!
//! Nodes remember the last observed kind and modification time of every
//! tracked path. Reconciling a node against a fresh observation produces
//! [`Diff`] entries; the tree itself never touches the filesystem.

mod diff;
mod entry_status;
mod tree;

pub use diff::{Diff, DiffKind};
pub use entry_status::{EntryKind, EntryStatus, StatError};
pub use tree::{Children, Listing, Node};
