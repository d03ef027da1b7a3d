//! Decides which paths the engine tracks.

use std::path::Path;

mod default_filter;
mod ignore_requests;
mod name_filter;

pub use default_filter::DefaultFilter;
pub use ignore_requests::IgnoreRequests;
pub use name_filter::NameFilter;

/// Predicate consulted for every entry the walker discovers.
///
/// Returning `false` ignores the entry (and its subtree) for good. A filter
/// may also ask for other paths to be ignored through `requests`; the walker
/// applies those before it continues.
pub trait Filter {
    fn keep(&self, path: &Path, requests: &mut IgnoreRequests) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Path, &mut IgnoreRequests) -> bool,
{
    fn keep(&self, path: &Path, requests: &mut IgnoreRequests) -> bool {
        self(path, requests)
    }
}
