//! The change aggregator and the public watch API.
//!
//! [`LocalWatchBuilder`] creates a [`LocalWatch`]; native events reach it
//! through a [`Notifier`], and every pull turns the accumulated events into
//! one batch of [`Diff`](crate::filesystem::Diff)s.

mod builder;
mod error;
mod local_watch;
mod notifier;
mod options;

pub use builder::LocalWatchBuilder;
pub use error::WatchError;
pub use local_watch::{LocalWatch, Transform};
pub use notifier::{Notifier, StopHandle};
pub use options::{RetryPolicy, WatchOptions};
