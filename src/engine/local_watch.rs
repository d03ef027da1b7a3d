use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;

use futures::future::{self, Either};
use futures::{Stream, StreamExt};
use futures_channel::mpsc::UnboundedReceiver;
use snafu::prelude::*;
use tracing::{debug, info, trace, warn};

use super::error::{ClosedSnafu, OpenFailedSnafu, RootNotDirectorySnafu, RootUnavailableSnafu};
use super::notifier::{Notifier, Signal, StopHandle, lock};
use super::{WatchError, WatchOptions};
use crate::ext::{AsyncTryFrom, AsyncTryInto, PathExt};
use crate::filesystem::{Diff, EntryStatus, Node};
use crate::filter::{Filter, IgnoreRequests};
use crate::walker::Walker;
use crate::watching::{SharedBackend, WatchManager, WatchScope};

pub type Transform = Box<dyn Fn(Diff) -> Diff>;

#[derive(Debug, Clone)]
enum OpenState {
    Pending,
    Opened,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    Elapsed,
    Woken,
    Stopped,
}

/// Recursive change detection below one root directory.
///
/// Native events only mark paths as pending. Each pull settles, reconciles
/// the pending paths against the mirror tree and hands back the resulting
/// batch, so the tree is only ever touched from inside [`next_batch`].
///
/// [`next_batch`]: LocalWatch::next_batch
pub struct LocalWatch {
    root: PathBuf,
    tree: Node,
    tick: u64,
    notifier: Notifier,
    signals: UnboundedReceiver<Signal>,
    watches: WatchManager,
    filter: Box<dyn Filter>,
    transform: Option<Transform>,
    options: WatchOptions,
    state: OpenState,
    keep_alive: usize,
    closed: bool,
}

impl LocalWatch {
    pub(crate) fn new(
        root: PathBuf,
        notifier: Notifier,
        signals: UnboundedReceiver<Signal>,
        backend: SharedBackend,
        filter: Box<dyn Filter>,
        transform: Option<Transform>,
        options: WatchOptions,
    ) -> Self {
        let keep_alive = usize::from(options.keep_alive);
        Self {
            root,
            tree: Node::root(),
            tick: 0,
            notifier,
            signals,
            watches: WatchManager::new(backend, keep_alive > 0),
            filter,
            transform,
            options,
            state: OpenState::Pending,
            keep_alive,
            closed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    /// Handle for reporting changes, as the native watcher does.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.notifier.stop_handle()
    }

    /// Resolves once the initial walk and the root watch are in place.
    ///
    /// The outcome is cached: after a failure every later call (and every
    /// pull) fails with [`WatchError::OpenFailed`].
    pub async fn opened(&mut self) -> Result<(), WatchError> {
        match &self.state {
            OpenState::Opened => return Ok(()),
            OpenState::Failed(message) => {
                return OpenFailedSnafu {
                    message: message.clone(),
                }
                .fail();
            }
            OpenState::Pending => {}
        }

        let result = self.open().await;
        self.state = match &result {
            Ok(()) => OpenState::Opened,
            Err(error) => OpenState::Failed(snafu::Report::from_error(error).to_string()),
        };
        result
    }

    async fn open(&mut self) -> Result<(), WatchError> {
        ensure!(!self.is_stopped(), ClosedSnafu);

        let status: EntryStatus = self
            .root
            .as_path()
            .async_try_into()
            .await
            .context(RootUnavailableSnafu)?;
        ensure!(
            status.is_directory(),
            RootNotDirectorySnafu {
                path: self.root.clone()
            }
        );
        self.tree.update(&self.root, status, &mut Vec::new());

        self.attach_root().await?;

        self.tick += 1;
        let mut initial = Vec::new();
        let mut walker = Walker::new(&self.root, &*self.filter, &self.watches, self.tick)
            .include_hidden(self.options.include_hidden);
        walker.walk(&mut self.tree, &self.root, &mut initial).await;
        let requests = walker.into_requests();
        self.apply_leftover(requests);

        info!(
            "Watching {} ({} files)",
            self.root.display(),
            initial.len()
        );
        Ok(())
    }

    async fn attach_root(&mut self) -> Result<(), WatchError> {
        let retry = self.options.watch_retry;
        let mut delays = retry.delays();

        loop {
            match self
                .watches
                .attach(&mut self.tree, &self.root, WatchScope::Root)
            {
                Ok(_) => return Ok(()),
                Err(error) => {
                    let delay = delays.next().unwrap_or(retry.max);
                    warn!(
                        "Failed to watch {}, retrying in {:?}: {}",
                        self.root.display(),
                        delay,
                        error
                    );
                    if self.wait(delay, false).await == Wait::Stopped {
                        return ClosedSnafu.fail();
                    }
                }
            }
        }
    }

    /// Pulls the next non-empty batch of changes, suspending until one is
    /// available.
    ///
    /// `Ok(None)` means the watch was stopped.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Diff>>, WatchError> {
        if self.closed || self.is_stopped() {
            self.close();
            return Ok(None);
        }
        self.opened().await?;

        loop {
            if !self.wait_for_events().await || !self.settle().await {
                if self.is_stopped() {
                    self.close();
                }
                return Ok(None);
            }

            let diffs = self.check().await;
            if !diffs.is_empty() {
                debug!("Cycle {} produced {} changes", self.tick, diffs.len());
                return Ok(Some(self.finish(diffs)));
            }
            trace!("Cycle {} produced no changes", self.tick);
        }
    }

    /// Turns the watch into a stream of batches, ending when it stops.
    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Diff>, WatchError>> {
        futures::stream::unfold(Some(self), |watch| async move {
            let mut watch = watch?;
            match watch.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(watch))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    async fn wait_for_events(&mut self) -> bool {
        loop {
            {
                let pending = lock(self.notifier.pending());
                if pending.is_stopped() {
                    return false;
                }
                if !pending.is_empty() {
                    return true;
                }
            }

            match self.signals.next().await {
                Some(Signal::Wake) => {}
                Some(Signal::Stop) | None => return false,
            }
        }
    }

    /// Waits until one full settle delay passes without new events.
    async fn settle(&mut self) -> bool {
        let delay = self.options.effective_settle_delay();
        if delay.is_zero() {
            return true;
        }

        loop {
            let generation = lock(self.notifier.pending()).generation();
            match self.wait(delay, true).await {
                Wait::Stopped => return false,
                Wait::Woken => {}
                Wait::Elapsed => {
                    if lock(self.notifier.pending()).generation() == generation {
                        return true;
                    }
                }
            }
        }
    }

    async fn wait(&mut self, delay: Duration, wake_early: bool) -> Wait {
        let mut timer = pin!(compio::time::sleep(delay));

        loop {
            let signal = match future::select(timer.as_mut(), self.signals.next()).await {
                Either::Left(_) => return Wait::Elapsed,
                Either::Right((signal, _)) => signal,
            };

            match signal {
                Some(Signal::Wake) if wake_early => return Wait::Woken,
                Some(Signal::Wake) => {}
                Some(Signal::Stop) | None => return Wait::Stopped,
            }
        }
    }

    /// Drains the pending set and reconciles every path in it.
    async fn check(&mut self) -> Vec<Diff> {
        let paths = lock(self.notifier.pending()).take();
        self.tick += 1;
        debug!("Cycle {}: checking {} paths", self.tick, paths.len());

        let mut diffs = Vec::new();
        let mut walker = Walker::new(&self.root, &*self.filter, &self.watches, self.tick)
            .include_hidden(self.options.include_hidden);
        for path in paths {
            check_path(
                &mut self.tree,
                &self.root,
                &self.watches,
                &mut walker,
                &path,
                &mut diffs,
            )
            .await;
            walker.apply_requests(&mut self.tree, &self.root);
        }
        let requests = walker.into_requests();
        self.apply_leftover(requests);

        diffs
    }

    fn apply_leftover(&mut self, mut requests: IgnoreRequests) {
        for target in requests.drain() {
            self.ignore(target);
        }
    }

    fn finish(&self, diffs: Vec<Diff>) -> Vec<Diff> {
        diffs
            .into_iter()
            .map(|diff| {
                if self.options.relative {
                    diff.relative_to(&self.root)
                } else {
                    diff
                }
            })
            .map(|diff| match &self.transform {
                Some(transform) => transform(diff),
                None => diff,
            })
            .collect()
    }

    /// Every tracked, non-ignored path, the root first.
    pub fn watching(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.tree.list(&self.root).map(|(path, _)| {
            if self.options.relative {
                path.dot_relative_to(&self.root)
            } else {
                path
            }
        })
    }

    /// Permanently ignores `path` (absolute, or relative to the root).
    ///
    /// Only a path that is tracked right now can be ignored; returns whether
    /// it was.
    pub fn ignore(&mut self, path: impl AsRef<Path>) -> bool {
        let target = path.as_ref().resolve_against(&self.root);
        let Ok(relative) = target.strip_prefix(&self.root) else {
            debug!("Not ignoring {}, outside the watch root", target.display());
            return false;
        };

        let ignored = self.tree.ignore_path(relative);
        if ignored {
            debug!("Ignored {}", target.display());
        }
        ignored
    }

    /// Increments the keep-alive count.
    pub fn retain(&mut self) {
        self.keep_alive += 1;
        if self.keep_alive == 1 {
            self.watches.set_referenced(&mut self.tree, true);
        }
    }

    /// Decrements the keep-alive count. At zero, every native watch is
    /// marked unreferenced; pulls still wait for events.
    pub fn release(&mut self) {
        if self.keep_alive == 0 {
            return;
        }
        self.keep_alive -= 1;
        if self.keep_alive == 0 {
            self.watches.set_referenced(&mut self.tree, false);
        }
    }

    pub fn is_referenced(&self) -> bool {
        self.keep_alive > 0
    }

    fn is_stopped(&self) -> bool {
        lock(self.notifier.pending()).is_stopped()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stops the watch and closes every native watch under the root.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        lock(self.notifier.pending()).stop();
        self.signals.close();
        self.tree.clear_all(&self.root, &mut Vec::new());
        info!("Stopped watching {}", self.root.display());
    }
}

impl Drop for LocalWatch {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for LocalWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWatch")
            .field("root", &self.root)
            .field("tick", &self.tick)
            .field("state", &self.state)
            .field("keep_alive", &self.keep_alive)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Reconciles one reported path against its closest tracked node.
async fn check_path(
    tree: &mut Node,
    root: &Path,
    watches: &WatchManager,
    walker: &mut Walker<'_>,
    path: &Path,
    diffs: &mut Vec<Diff>,
) {
    let Ok(relative) = path.strip_prefix(root) else {
        trace!("Skipping {}, outside the watch root", path.display());
        return;
    };

    let names = tree.closest(relative);
    if tree.descend(&names).is_none_or(Node::is_ignored) {
        return;
    }
    let target = names
        .iter()
        .fold(root.to_path_buf(), |target, name| target.join(name));

    let status = match EntryStatus::async_try_from(target.as_path()).await {
        Ok(status) => status,
        Err(error) => {
            trace!("{}, treating as deleted", error);
            delete_from_parent(tree, &names, &target, diffs);
            return;
        }
    };

    let Some(node) = tree.descend_mut(&names) else {
        return;
    };
    node.update(&target, status, diffs);
    if !status.is_directory() {
        return;
    }

    if !names.is_empty() {
        if let Err(error) = watches.attach(node, &target, WatchScope::Directory) {
            warn!("Failed to watch {}: {}", target.display(), error);
        }
    }
    walker.walk(node, &target, diffs).await;
}

fn delete_from_parent(tree: &mut Node, names: &[OsString], target: &Path, diffs: &mut Vec<Diff>) {
    // The root itself is never removed from the tree
    let Some((name, parent_names)) = names.split_last() else {
        debug!("Watch root {} is gone", target.display());
        return;
    };

    if let Some(parent) = tree.descend_mut(parent_names) {
        parent.delete(name, target, diffs);
    }
}
