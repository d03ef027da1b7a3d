use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use hashlink::LinkedHashSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Wake,
    Stop,
}

/// Paths reported by the native watcher since the last cycle.
///
/// Every arrival bumps `generation`, including duplicates, so the settle
/// delay can tell a quiet window from a busy one.
#[derive(Debug)]
pub(crate) struct PendingPaths {
    root: PathBuf,
    paths: LinkedHashSet<PathBuf>,
    limit: Option<usize>,
    generation: u64,
    stopped: bool,
}

impl PendingPaths {
    fn new(root: PathBuf, limit: Option<usize>) -> Self {
        Self {
            root,
            paths: LinkedHashSet::new(),
            limit,
            generation: 0,
            stopped: false,
        }
    }

    fn push(&mut self, path: PathBuf) {
        self.generation += 1;

        if self.paths.contains(&self.root) {
            return;
        }

        self.paths.insert(path);
        if self.limit.is_some_and(|limit| self.paths.len() > limit) {
            debug!(
                "More than {} pending paths, collapsing to a full rescan",
                self.paths.len() - 1
            );
            self.paths.clear();
            self.paths.insert(self.root.clone());
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub(crate) fn take(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths).into_iter().collect()
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
        self.paths.clear();
    }
}

pub(crate) type SharedPending = Arc<Mutex<PendingPaths>>;

pub(crate) fn lock(pending: &SharedPending) -> MutexGuard<'_, PendingPaths> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn channel(
    root: PathBuf,
    limit: Option<usize>,
) -> (Notifier, UnboundedReceiver<Signal>) {
    let (signals, receiver) = unbounded();
    let notifier = Notifier {
        pending: Arc::new(Mutex::new(PendingPaths::new(root, limit))),
        signals,
    };
    (notifier, receiver)
}

/// Feeds changed paths into a [`LocalWatch`](super::LocalWatch).
///
/// Cheap to clone and usable from any thread; native watcher callbacks hold
/// one each. Reports arriving after the watch stopped are dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    pending: SharedPending,
    signals: UnboundedSender<Signal>,
}

impl Notifier {
    pub fn changed(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        {
            let mut pending = lock(&self.pending);
            if pending.is_stopped() {
                return;
            }
            trace!("Change reported at {}", path.display());
            pending.push(path);
        }

        // Only fails once the watch is gone
        let _ = self.signals.unbounded_send(Signal::Wake);
    }

    /// Schedules a full reconciliation of the watch root.
    pub fn rescan(&self) {
        let root = lock(&self.pending).root.clone();
        self.changed(root);
    }

    pub(crate) fn pending(&self) -> &SharedPending {
        &self.pending
    }

    pub(crate) fn stop_handle(&self) -> StopHandle {
        StopHandle {
            pending: self.pending.clone(),
            signals: self.signals.clone(),
        }
    }
}

/// Tears a [`LocalWatch`](super::LocalWatch) down from elsewhere.
///
/// A pull waiting for events or sitting in the settle delay returns
/// `Ok(None)` right away.
#[derive(Debug, Clone)]
pub struct StopHandle {
    pending: SharedPending,
    signals: UnboundedSender<Signal>,
}

impl StopHandle {
    pub fn stop(&self) {
        lock(&self.pending).stop();
        let _ = self.signals.unbounded_send(Signal::Stop);
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.pending).is_stopped()
    }
}
