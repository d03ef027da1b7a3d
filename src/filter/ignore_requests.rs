use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ext::PathExt;

/// The only thing a [`Filter`](super::Filter) may do to the engine: ask for
/// paths to be ignored permanently.
///
/// Relative paths resolve against the watch root. Paths outside the root are
/// dropped.
#[derive(Debug, Clone)]
pub struct IgnoreRequests {
    root: PathBuf,
    requested: Vec<PathBuf>,
}

impl IgnoreRequests {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            requested: Vec::new(),
        }
    }

    pub fn ignore(&mut self, path: impl AsRef<Path>) {
        let target = path.as_ref().resolve_against(&self.root);
        if !target.is_rooted_in(&self.root) {
            debug!(
                "Ignore request for {} is outside the watch root",
                target.display()
            );
            return;
        }

        if !self.requested.contains(&target) {
            self.requested.push(target);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    pub fn requested(&self) -> &[PathBuf] {
        &self.requested
    }

    /// Removes a request for exactly `path`, reporting whether there was one.
    pub(crate) fn take_exact(&mut self, path: &Path) -> bool {
        let before = self.requested.len();
        self.requested.retain(|requested| requested != path);
        before != self.requested.len()
    }

    pub(crate) fn retain(&mut self, keep: impl FnMut(&PathBuf) -> bool) {
        self.requested.retain(keep);
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = PathBuf> + '_ {
        self.requested.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_requests_resolve_against_root() {
        let mut requests = IgnoreRequests::new("/watch");

        requests.ignore("build/out");

        assert_eq!(requests.requested(), [PathBuf::from("/watch/build/out")]);
    }

    #[test]
    fn requests_outside_root_are_dropped() {
        let mut requests = IgnoreRequests::new("/watch");

        requests.ignore("/elsewhere");
        requests.ignore("../escape");

        assert!(requests.is_empty());
    }

    #[test]
    fn duplicate_requests_collapse() {
        let mut requests = IgnoreRequests::new("/watch");

        requests.ignore("/watch/a");
        requests.ignore("a");

        assert_eq!(requests.requested().len(), 1);
        assert!(requests.take_exact(Path::new("/watch/a")));
        assert!(!requests.take_exact(Path::new("/watch/a")));
    }
}
