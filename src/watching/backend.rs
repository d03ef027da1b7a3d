use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, WatcherKind};
use tracing::{trace, warn};

use crate::engine::Notifier;

/// The native change-notification primitive.
///
/// Implementations report changed paths through the [`Notifier`] they were
/// created with. Whether a single watch covers a whole subtree is probed once
/// through [`WatchBackend::supports_recursion`].
pub trait WatchBackend {
    fn supports_recursion(&self) -> bool;

    fn watch(&mut self, path: &Path, recursive: bool) -> notify::Result<()>;

    fn unwatch(&mut self, path: &Path) -> notify::Result<()>;
}

pub type SharedBackend = Rc<RefCell<dyn WatchBackend>>;

/// [`WatchBackend`] on top of the platform's recommended `notify` watcher.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    pub fn new(notifier: Notifier) -> notify::Result<Self> {
        let watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => forward_event(&notifier, event),
                Err(error) => {
                    warn!("Native watcher reported an error: {}", error);
                    if error.paths.is_empty() {
                        notifier.rescan();
                    }
                    for path in error.paths {
                        notifier.changed(path);
                    }
                }
            })?;

        Ok(Self { watcher })
    }
}

fn forward_event(notifier: &Notifier, event: Event) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    if event.paths.is_empty() {
        trace!("Native event without paths ({:?}), rescanning root", event.kind);
        notifier.rescan();
        return;
    }

    for path in event.paths {
        notifier.changed(path);
    }
}

impl WatchBackend for NotifyBackend {
    fn supports_recursion(&self) -> bool {
        // inotify and kqueue only report direct children of a watched directory
        !matches!(
            RecommendedWatcher::kind(),
            WatcherKind::Inotify | WatcherKind::Kqueue
        )
    }

    fn watch(&mut self, path: &Path, recursive: bool) -> notify::Result<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher.watch(path, mode)
    }

    fn unwatch(&mut self, path: &Path) -> notify::Result<()> {
        self.watcher.unwatch(path)
    }
}

impl fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("kind", &RecommendedWatcher::kind())
            .finish()
    }
}
