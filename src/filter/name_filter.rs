use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;

use super::{Filter, IgnoreRequests};

/// Excludes entries by file name, deferring everything else to `inner`.
#[derive(Debug, Clone)]
pub struct NameFilter<F> {
    names: HashSet<OsString>,
    inner: F,
}

impl<F: Filter> NameFilter<F> {
    pub fn new(names: impl IntoIterator<Item = impl Into<OsString>>, inner: F) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            inner,
        }
    }
}

impl<F: Filter> Filter for NameFilter<F> {
    fn keep(&self, path: &Path, requests: &mut IgnoreRequests) -> bool {
        if path
            .file_name()
            .is_some_and(|name| self.names.contains(name))
        {
            return false;
        }
        self.inner.keep(path, requests)
    }
}
