use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, trace, warn};

use crate::ext::AsyncTryFrom;
use crate::filesystem::{Diff, EntryStatus, Node};
use crate::filter::{Filter, IgnoreRequests};
use crate::watching::{WatchManager, WatchScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    Completed,
    /// The walked directory (or one of its ancestors) was ignored mid-walk.
    Aborted,
}

/// Reconciles directories on disk against the mirror tree.
///
/// One walker serves one reconciliation cycle: every directory is walked at
/// most once per `tick`. Ignore requests raised by the filter are applied at
/// the deepest directory that contains them; requests that target the
/// directory being walked (or an ancestor) abort the walk up to the level
/// that can apply them. Whatever is left is handed back through
/// [`Walker::into_requests`].
pub struct Walker<'a> {
    filter: &'a dyn Filter,
    watches: &'a WatchManager,
    tick: u64,
    include_hidden: bool,
    requests: IgnoreRequests,
}

impl<'a> Walker<'a> {
    pub fn new(root: &Path, filter: &'a dyn Filter, watches: &'a WatchManager, tick: u64) -> Self {
        Self {
            filter,
            watches,
            tick,
            include_hidden: true,
            requests: IgnoreRequests::new(root),
        }
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn into_requests(self) -> IgnoreRequests {
        self.requests
    }

    pub fn walk<'w>(
        &'w mut self,
        node: &'w mut Node,
        path: &'w Path,
        diffs: &'w mut Vec<Diff>,
    ) -> LocalBoxFuture<'w, WalkOutcome> {
        async move {
            if !node.visit(self.tick) {
                trace!("{} already walked in cycle {}", path.display(), self.tick);
                return WalkOutcome::Completed;
            }

            let Some(names) = list_dir(path) else {
                return WalkOutcome::Completed;
            };
            trace!("Walking {} ({} entries)", path.display(), names.len());

            let mut present = HashSet::with_capacity(names.len());
            for name in names {
                if !self.include_hidden && is_hidden(&name) {
                    present.insert(name);
                    continue;
                }

                let entry = path.join(&name);
                let status = match EntryStatus::async_try_from(entry.as_path()).await {
                    Ok(status) => status,
                    Err(error) => {
                        trace!("{}, treating as deleted", error);
                        node.delete(&name, &entry, diffs);
                        continue;
                    }
                };
                present.insert(name.clone());

                let mut ignored = !self.filter.keep(&entry, &mut self.requests);
                ignored |= self.requests.take_exact(&entry);
                if self.apply_requests(node, path) == WalkOutcome::Aborted || node.is_ignored() {
                    return WalkOutcome::Aborted;
                }

                let child = node.put(name, &entry, status, ignored, diffs);
                if child.is_ignored() || !child.is_directory() {
                    continue;
                }

                if let Err(error) = self.watches.attach(child, &entry, WatchScope::Directory) {
                    // Still covered by re-walks triggered from ancestors
                    warn!("Failed to watch {}: {}", entry.display(), error);
                }
                self.walk(child, &entry, diffs).await;

                if self.apply_requests(node, path) == WalkOutcome::Aborted {
                    return WalkOutcome::Aborted;
                }
            }

            node.prune(path, &present, diffs);
            WalkOutcome::Completed
        }
        .boxed_local()
    }

    /// Applies pending ignore requests that fall strictly below `path`.
    ///
    /// Reports [`WalkOutcome::Aborted`] when a request targets `path` itself
    /// or one of its ancestors; such requests stay pending.
    pub fn apply_requests(&mut self, node: &mut Node, path: &Path) -> WalkOutcome {
        if self.requests.is_empty() {
            return WalkOutcome::Completed;
        }

        let mut outcome = WalkOutcome::Completed;
        self.requests.retain(|target| {
            if path.starts_with(target) {
                outcome = WalkOutcome::Aborted;
                return true;
            }

            match target.strip_prefix(path) {
                Ok(relative) => {
                    if node.ignore_path(relative) {
                        debug!("Ignored {} on request", target.display());
                    }
                    false
                }
                Err(_) => true,
            }
        });

        outcome
    }
}

/// Lists the entry names of a directory in a stable order.
///
/// `None` means the directory could not be read; callers treat it as empty.
fn list_dir(path: &Path) -> Option<Vec<OsString>> {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(error) => {
            trace!("Failed to list {}: {}", path.display(), error);
            return None;
        }
    };

    let mut names = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect::<Vec<_>>();
    names.sort();
    Some(names)
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}
