//! Native watch attachment.
//!
//! The platform primitive sits behind [`WatchBackend`]; [`WatchManager`]
//! decides which tree nodes own a [`WatchHandle`].

mod backend;
mod handle;
mod manager;

pub use backend::{NotifyBackend, SharedBackend, WatchBackend};
pub use handle::WatchHandle;
pub use manager::{WatchManager, WatchScope};

#[cfg(test)]
pub(crate) use backend::testing;
