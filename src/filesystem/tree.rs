use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use hashlink::LinkedHashMap;
use hashlink::linked_hash_map::Entry;
use tracing::trace;

use crate::filesystem::{Diff, EntryStatus};
use crate::watching::WatchHandle;

pub type Children = LinkedHashMap<OsString, Node>;

/// Last known state of one path under the watch root.
///
/// `children` stays `None` until a directory has been scanned once. An
/// ignored node is kept as a childless tombstone so that the path stays
/// ignored if it is deleted and recreated later.
#[derive(Debug)]
pub struct Node {
    status: EntryStatus,
    children: Option<Children>,
    watch: Option<WatchHandle>,
    visited_tick: u64,
    ignored: bool,
}

impl Node {
    pub fn new(status: EntryStatus, ignored: bool) -> Self {
        Self {
            status,
            children: None,
            watch: None,
            visited_tick: 0,
            ignored,
        }
    }

    /// Node for the watch root, before it has been stat'ed.
    pub fn root() -> Self {
        Self::new(EntryStatus::directory(None), false)
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn is_directory(&self) -> bool {
        self.status.is_directory()
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub fn is_scanned(&self) -> bool {
        self.children.is_some()
    }

    pub fn has_watch(&self) -> bool {
        self.watch.is_some()
    }

    pub(crate) fn set_watch(&mut self, handle: WatchHandle) {
        self.close_watch();
        self.watch = Some(handle);
    }

    /// Stamps the node with `tick`, returning `false` if it already carried it.
    pub(crate) fn visit(&mut self, tick: u64) -> bool {
        if self.visited_tick == tick {
            return false;
        }
        self.visited_tick = tick;
        true
    }

    pub fn get(&self, name: &OsStr) -> Option<&Node> {
        self.children.as_ref()?.get(name)
    }

    pub fn get_mut(&mut self, name: &OsStr) -> Option<&mut Node> {
        self.children.as_mut()?.get_mut(name)
    }

    /// Records the child `name` (located at `path`) as observed with `status`.
    ///
    /// A newly seen file emits an update. An existing child that is newly
    /// ignored drops its whole subtree silently; otherwise it is updated.
    pub fn put(
        &mut self,
        name: OsString,
        path: &Path,
        status: EntryStatus,
        ignored: bool,
        diffs: &mut Vec<Diff>,
    ) -> &mut Node {
        let children = self.children.get_or_insert_with(Children::new);

        match children.entry(name) {
            Entry::Occupied(occupied) => {
                let existing = occupied.into_mut();
                if !existing.ignored {
                    if ignored {
                        trace!("Ignoring {}", path.display());
                        existing.ignore_all();
                    } else {
                        existing.update(path, status, diffs);
                    }
                }
                existing
            }
            Entry::Vacant(vacant) => {
                if status.is_file() && !ignored {
                    diffs.push(Diff::update(path));
                }
                vacant.insert(Node::new(status, ignored))
            }
        }
    }

    /// Re-observes this node at `path`.
    ///
    /// Nothing happens while the modification time is unchanged. When the
    /// entry flipped between file and directory the previous subtree is
    /// invalidated first.
    pub fn update(&mut self, path: &Path, status: EntryStatus, diffs: &mut Vec<Diff>) {
        if self.status.modified_at == status.modified_at {
            return;
        }

        if self.status.kind != status.kind {
            trace!(
                "{} changed from {} to {}",
                path.display(),
                self.status.kind,
                status.kind
            );
            self.clear_all(path, diffs);
        }

        self.status = status;
        if status.is_file() && !self.ignored {
            diffs.push(Diff::update(path));
        }
    }

    /// Forgets the child `name` (located at `path`) and everything below it.
    ///
    /// Ignored children stay behind as tombstones.
    pub fn delete(&mut self, name: &OsStr, path: &Path, diffs: &mut Vec<Diff>) {
        let Some(children) = self.children.as_mut() else {
            return;
        };
        if children.get(name).is_none_or(|child| child.ignored) {
            return;
        }

        if let Some(mut existing) = children.remove(name) {
            existing.clear_all(path, diffs);
        }
    }

    /// Permanently ignores this node and its subtree, without emitting diffs.
    pub fn ignore_all(&mut self) {
        self.mark_ignored();
        self.clear_all(Path::new(""), &mut Vec::new());
    }

    fn mark_ignored(&mut self) {
        self.ignored = true;
        if let Some(children) = self.children.as_mut() {
            for child in children.values_mut() {
                child.mark_ignored();
            }
        }
    }

    /// Closes every watch under this node and drops its children.
    ///
    /// Every tracked file in the subtree (this node included) emits a delete.
    pub fn clear_all(&mut self, path: &Path, diffs: &mut Vec<Diff>) {
        self.close_watch();

        match self.children.take() {
            Some(children) => {
                for (name, mut child) in children {
                    let child_path = path.join(&name);
                    child.clear_all(&child_path, diffs);
                }
            }
            None => {
                if self.status.is_file() && !self.ignored {
                    diffs.push(Diff::delete(path));
                }
            }
        }
    }

    /// Deletes tracked children whose names were not seen in a fresh listing.
    pub fn prune(&mut self, path: &Path, present: &HashSet<OsString>, diffs: &mut Vec<Diff>) {
        let Some(children) = self.children.as_ref() else {
            return;
        };

        let vanished = children
            .iter()
            .filter(|(name, child)| !child.ignored && !present.contains(*name))
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();

        for name in vanished {
            trace!("{} vanished without an event", path.join(&name).display());
            self.delete(&name, &path.join(&name), diffs);
        }
    }

    /// Depth-first preorder listing of the tracked (non-ignored) subtree.
    pub fn list(&self, path: &Path) -> Listing<'_> {
        Listing {
            stack: vec![(path.to_path_buf(), self)],
        }
    }

    /// Names leading to the deepest tracked node on the way to `relative`.
    pub fn closest(&self, relative: &Path) -> Vec<OsString> {
        let mut names = Vec::new();
        let mut node = self;

        for name in normal_components(relative) {
            match node.get(name) {
                Some(next) => {
                    names.push(name.to_os_string());
                    node = next;
                }
                None => break,
            }
        }

        names
    }

    pub fn descend(&self, names: &[OsString]) -> Option<&Node> {
        names
            .iter()
            .try_fold(self, |node, name| node.get(name.as_os_str()))
    }

    pub fn descend_mut(&mut self, names: &[OsString]) -> Option<&mut Node> {
        names
            .iter()
            .try_fold(self, |node, name| node.get_mut(name.as_os_str()))
    }

    /// Ignores the node at `relative` if it is currently tracked.
    ///
    /// Paths whose closest tracked ancestor is not the path itself are left
    /// alone.
    pub fn ignore_path(&mut self, relative: &Path) -> bool {
        let names = self.closest(relative);
        if names.len() != normal_components(relative).count() {
            return false;
        }

        match self.descend_mut(&names) {
            Some(node) if !node.ignored => {
                node.ignore_all();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn for_each_watch_mut(&mut self, f: &mut dyn FnMut(&mut WatchHandle)) {
        if let Some(handle) = self.watch.as_mut() {
            f(handle);
        }
        if let Some(children) = self.children.as_mut() {
            for child in children.values_mut() {
                child.for_each_watch_mut(f);
            }
        }
    }

    fn close_watch(&mut self) {
        if let Some(handle) = self.watch.take() {
            handle.close();
        }
    }
}

fn normal_components(path: &Path) -> impl Iterator<Item = &OsStr> {
    path.components().filter_map(|component| match component {
        Component::Normal(name) => Some(name),
        _ => None,
    })
}

/// Iterator returned by [`Node::list`].
#[derive(Debug, Clone)]
pub struct Listing<'a> {
    stack: Vec<(PathBuf, &'a Node)>,
}

impl<'a> Iterator for Listing<'a> {
    type Item = (PathBuf, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            if node.ignored {
                continue;
            }

            if let Some(children) = node.children.as_ref() {
                let start = self.stack.len();
                self.stack
                    .extend(children.iter().map(|(name, child)| (path.join(name), child)));
                self.stack[start..].reverse();
            }

            return Some((path, node));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::filesystem::DiffKind;
    use crate::watching::testing::RecordingBackend;
    use crate::watching::{WatchManager, WatchScope};

    fn at(seconds: u64) -> Option<SystemTime> {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds))
    }

    fn name(value: &str) -> OsString {
        OsString::from(value)
    }

    /// root/
    ///   a/
    ///     b/
    ///       c/d/file
    ///       file
    ///   top
    fn sample_tree(diffs: &mut Vec<Diff>) -> Node {
        let mut root = Node::root();
        let a = root.put(name("a"), Path::new("/r/a"), EntryStatus::directory(at(1)), false, diffs);
        let b = a.put(name("b"), Path::new("/r/a/b"), EntryStatus::directory(at(1)), false, diffs);
        let c = b.put(name("c"), Path::new("/r/a/b/c"), EntryStatus::directory(at(1)), false, diffs);
        let d = c.put(name("d"), Path::new("/r/a/b/c/d"), EntryStatus::directory(at(1)), false, diffs);
        d.put(name("file"), Path::new("/r/a/b/c/d/file"), EntryStatus::file(at(1)), false, diffs);
        b.put(name("file"), Path::new("/r/a/b/file"), EntryStatus::file(at(1)), false, diffs);
        root.put(name("top"), Path::new("/r/top"), EntryStatus::file(at(1)), false, diffs);
        root
    }

    fn listed(root: &Node) -> Vec<PathBuf> {
        root.list(Path::new("/r")).map(|(path, _)| path).collect()
    }

    #[test]
    fn new_file_emits_update() {
        let mut root = Node::root();
        let mut diffs = Vec::new();

        root.put(name("foo"), Path::new("/r/foo"), EntryStatus::file(at(1)), false, &mut diffs);

        assert_eq!(diffs, vec![Diff::update("/r/foo")]);
    }

    #[test]
    fn new_directory_is_silent_and_unscanned() {
        let mut root = Node::root();
        let mut diffs = Vec::new();

        let dir = root.put(name("dir"), Path::new("/r/dir"), EntryStatus::directory(at(1)), false, &mut diffs);

        assert!(diffs.is_empty());
        assert!(!dir.is_scanned());
        assert!(root.is_scanned());
    }

    #[test]
    fn new_ignored_file_is_silent_and_unlisted() {
        let mut root = Node::root();
        let mut diffs = Vec::new();

        root.put(name(".git"), Path::new("/r/.git"), EntryStatus::file(at(1)), true, &mut diffs);

        assert!(diffs.is_empty());
        assert_eq!(listed(&root), vec![PathBuf::from("/r")]);
    }

    #[test]
    fn unchanged_modification_time_is_idempotent() {
        let mut root = Node::root();
        let mut diffs = Vec::new();
        root.put(name("foo"), Path::new("/r/foo"), EntryStatus::file(at(1)), false, &mut diffs);
        diffs.clear();

        root.put(name("foo"), Path::new("/r/foo"), EntryStatus::file(at(1)), false, &mut diffs);
        root.get_mut(OsStr::new("foo"))
            .unwrap()
            .update(Path::new("/r/foo"), EntryStatus::file(at(1)), &mut diffs);

        assert!(diffs.is_empty());
    }

    #[test]
    fn changed_modification_time_emits_update() {
        let mut root = Node::root();
        let mut diffs = Vec::new();
        root.put(name("foo"), Path::new("/r/foo"), EntryStatus::file(at(1)), false, &mut diffs);
        diffs.clear();

        root.put(name("foo"), Path::new("/r/foo"), EntryStatus::file(at(2)), false, &mut diffs);

        assert_eq!(diffs, vec![Diff::update("/r/foo")]);
    }

    #[test]
    fn directory_mtime_change_is_silent() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.put(name("a"), Path::new("/r/a"), EntryStatus::directory(at(5)), false, &mut diffs);

        assert!(diffs.is_empty());
        assert!(root.get(OsStr::new("a")).unwrap().is_scanned());
    }

    #[test]
    fn directory_replaced_by_file_deletes_descendants_first() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.put(name("a"), Path::new("/r/a"), EntryStatus::file(at(2)), false, &mut diffs);

        assert_eq!(
            diffs,
            vec![
                Diff::delete("/r/a/b/c/d/file"),
                Diff::delete("/r/a/b/file"),
                Diff::update("/r/a"),
            ]
        );
        assert!(!root.get(OsStr::new("a")).unwrap().is_scanned());
    }

    #[test]
    fn file_replaced_by_directory_deletes_the_file() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.put(name("top"), Path::new("/r/top"), EntryStatus::directory(at(2)), false, &mut diffs);

        assert_eq!(diffs, vec![Diff::delete("/r/top")]);
        assert!(root.get(OsStr::new("top")).unwrap().is_directory());
    }

    #[test]
    fn delete_emits_deletes_for_files_only() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.delete(OsStr::new("a"), Path::new("/r/a"), &mut diffs);

        assert_eq!(
            diffs,
            vec![Diff::delete("/r/a/b/c/d/file"), Diff::delete("/r/a/b/file")]
        );
        assert!(diffs.iter().all(|diff| diff.kind == DiffKind::Delete));
        assert!(root.get(OsStr::new("a")).is_none());
    }

    #[test]
    fn delete_of_unknown_name_is_a_no_op() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.delete(OsStr::new("missing"), Path::new("/r/missing"), &mut diffs);
        Node::root().delete(OsStr::new("a"), Path::new("/r/a"), &mut diffs);

        assert!(diffs.is_empty());
    }

    #[test]
    fn ignore_all_is_silent_and_permanent() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        assert!(root.ignore_path(Path::new("a/b")));
        root.get_mut(OsStr::new("a"))
            .unwrap()
            .put(name("b"), Path::new("/r/a/b"), EntryStatus::directory(at(9)), false, &mut diffs);
        root.get_mut(OsStr::new("a"))
            .unwrap()
            .delete(OsStr::new("b"), Path::new("/r/a/b"), &mut diffs);

        assert!(diffs.is_empty());
        let b = root.descend(&[name("a"), name("b")]).unwrap();
        assert!(b.is_ignored());
        assert!(!b.is_scanned());
        assert_eq!(
            listed(&root),
            vec![PathBuf::from("/r"), PathBuf::from("/r/a"), PathBuf::from("/r/top")]
        );
    }

    #[test]
    fn put_ignoring_an_existing_child_drops_it_silently() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();

        root.put(name("top"), Path::new("/r/top"), EntryStatus::file(at(9)), true, &mut diffs);
        root.put(name("top"), Path::new("/r/top"), EntryStatus::file(at(10)), false, &mut diffs);

        assert!(diffs.is_empty());
        assert!(root.get(OsStr::new("top")).unwrap().is_ignored());
        assert!(!listed(&root).contains(&PathBuf::from("/r/top")));
    }

    #[test]
    fn ignore_path_requires_an_exact_tracked_match() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);

        assert!(!root.ignore_path(Path::new("a/b/not-there")));
        assert!(!root.descend(&[name("a"), name("b")]).unwrap().is_ignored());
        assert!(root.ignore_path(Path::new("top")));
        assert!(!root.ignore_path(Path::new("top")));
    }

    #[test]
    fn clear_all_closes_every_watch() {
        let recording = RecordingBackend::shared(false);
        let manager = WatchManager::new(recording.clone(), true);
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        manager.attach(&mut root, Path::new("/r"), WatchScope::Root).unwrap();
        let a = root.get_mut(OsStr::new("a")).unwrap();
        manager.attach(a, Path::new("/r/a"), WatchScope::Directory).unwrap();
        let b = a.get_mut(OsStr::new("b")).unwrap();
        manager.attach(b, Path::new("/r/a/b"), WatchScope::Directory).unwrap();

        root.delete(OsStr::new("a"), Path::new("/r/a"), &mut diffs);

        assert_eq!(
            recording.borrow().detached,
            vec![PathBuf::from("/r/a"), PathBuf::from("/r/a/b")]
        );
        assert_eq!(recording.borrow().active, vec![PathBuf::from("/r")]);
    }

    #[test]
    fn list_is_preorder_and_restartable() {
        let mut diffs = Vec::new();
        let root = sample_tree(&mut diffs);

        let expected = vec![
            PathBuf::from("/r"),
            PathBuf::from("/r/a"),
            PathBuf::from("/r/a/b"),
            PathBuf::from("/r/a/b/c"),
            PathBuf::from("/r/a/b/c/d"),
            PathBuf::from("/r/a/b/c/d/file"),
            PathBuf::from("/r/a/b/file"),
            PathBuf::from("/r/top"),
        ];
        assert_eq!(listed(&root), expected);
        assert_eq!(listed(&root), expected);
    }

    #[test]
    fn closest_stops_at_deepest_tracked_node() {
        let mut diffs = Vec::new();
        let root = sample_tree(&mut diffs);

        assert_eq!(
            root.closest(Path::new("a/b/new/deeper")),
            vec![name("a"), name("b")]
        );
        assert!(root.closest(Path::new("")).is_empty());
    }

    #[test]
    fn prune_deletes_children_missing_from_listing() {
        let mut diffs = Vec::new();
        let mut root = sample_tree(&mut diffs);
        diffs.clear();
        let present = HashSet::from([name("a")]);

        root.prune(Path::new("/r"), &present, &mut diffs);

        assert_eq!(diffs, vec![Diff::delete("/r/top")]);
        assert!(root.get(OsStr::new("a")).is_some());
    }

    #[test]
    fn visit_guards_one_walk_per_tick() {
        let mut root = Node::root();

        assert!(root.visit(1));
        assert!(!root.visit(1));
        assert!(root.visit(2));
    }
}
