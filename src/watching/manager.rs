use std::fmt;
use std::path::Path;

use tracing::{debug, trace};

use super::{SharedBackend, WatchHandle};
use crate::filesystem::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchScope {
    Root,
    Directory,
}

/// Decides where native watches go and hands them to tree nodes.
///
/// With a recursion-capable backend only the root carries a (recursive)
/// watch. Otherwise every tracked directory gets its own non-recursive one.
pub struct WatchManager {
    backend: SharedBackend,
    recursive: bool,
    referenced: bool,
}

impl WatchManager {
    pub fn new(backend: SharedBackend, referenced: bool) -> Self {
        let recursive = backend.borrow().supports_recursion();
        debug!(
            "Native watcher {} recursive watches",
            if recursive { "supports" } else { "does not support" }
        );

        Self {
            backend,
            recursive,
            referenced,
        }
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    pub fn needs_watch(&self, scope: WatchScope) -> bool {
        scope == WatchScope::Root || !self.recursive
    }

    /// Attaches a watch to `node` unless one is unnecessary or already present.
    ///
    /// Returns whether a new watch was attached.
    pub fn attach(
        &self,
        node: &mut Node,
        path: &Path,
        scope: WatchScope,
    ) -> notify::Result<bool> {
        if node.is_ignored() || node.has_watch() || !self.needs_watch(scope) {
            return Ok(false);
        }

        self.backend.borrow_mut().watch(path, self.recursive)?;
        trace!("Watching {}", path.display());

        node.set_watch(WatchHandle::new(
            path.to_path_buf(),
            self.backend.clone(),
            self.recursive,
            self.referenced,
        ));
        Ok(true)
    }

    /// Propagates the keep-alive flag to every handle under `tree`.
    pub fn set_referenced(&mut self, tree: &mut Node, referenced: bool) {
        self.referenced = referenced;
        tree.for_each_watch_mut(&mut |handle| handle.set_referenced(referenced));
    }
}

impl fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchManager")
            .field("recursive", &self.recursive)
            .field("referenced", &self.referenced)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{OsStr, OsString};
    use std::path::PathBuf;

    use super::*;
    use crate::filesystem::EntryStatus;
    use crate::watching::testing::RecordingBackend;

    fn tree_with_directory() -> Node {
        let mut root = Node::root();
        root.put(
            OsString::from("a"),
            Path::new("/root/a"),
            EntryStatus::directory(None),
            false,
            &mut Vec::new(),
        );
        root
    }

    #[test]
    fn recursive_backend_only_watches_root() {
        let recording = RecordingBackend::shared(true);
        let manager = WatchManager::new(recording.clone(), true);
        let mut root = tree_with_directory();

        assert!(manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap());
        let child = root.get_mut(OsStr::new("a")).unwrap();
        assert!(!manager.attach(child, Path::new("/root/a"), WatchScope::Directory).unwrap());

        assert_eq!(
            recording.borrow().attached,
            vec![(PathBuf::from("/root"), true)]
        );
    }

    #[test]
    fn non_recursive_backend_watches_each_directory() {
        let recording = RecordingBackend::shared(false);
        let manager = WatchManager::new(recording.clone(), true);
        let mut root = tree_with_directory();

        manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap();
        let child = root.get_mut(OsStr::new("a")).unwrap();
        manager.attach(child, Path::new("/root/a"), WatchScope::Directory).unwrap();

        assert_eq!(
            recording.borrow().attached,
            vec![
                (PathBuf::from("/root"), false),
                (PathBuf::from("/root/a"), false)
            ]
        );
    }

    #[test]
    fn attach_is_idempotent() {
        let recording = RecordingBackend::shared(false);
        let manager = WatchManager::new(recording.clone(), true);
        let mut root = Node::root();

        assert!(manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap());
        assert!(!manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap());
        assert_eq!(recording.borrow().attached.len(), 1);
    }

    #[test]
    fn failed_attach_leaves_node_unwatched() {
        let recording = RecordingBackend::failing(false, 1);
        let manager = WatchManager::new(recording.clone(), true);
        let mut root = Node::root();

        assert!(manager.attach(&mut root, Path::new("/root"), WatchScope::Root).is_err());
        assert!(!root.has_watch());
        assert!(manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap());
    }

    #[test]
    fn reference_flag_reaches_every_handle() {
        let recording = RecordingBackend::shared(false);
        let mut manager = WatchManager::new(recording.clone(), true);
        let mut root = tree_with_directory();
        manager.attach(&mut root, Path::new("/root"), WatchScope::Root).unwrap();
        let child = root.get_mut(OsStr::new("a")).unwrap();
        manager.attach(child, Path::new("/root/a"), WatchScope::Directory).unwrap();

        manager.set_referenced(&mut root, false);

        let mut flags = Vec::new();
        root.for_each_watch_mut(&mut |handle| flags.push(handle.is_referenced()));
        assert_eq!(flags, vec![false, false]);
        assert!(!manager.is_referenced());
    }
}
