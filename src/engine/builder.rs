use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use snafu::ResultExt;
use tracing::debug;

use super::error::{BackendSnafu, RootPathSnafu};
use super::local_watch::Transform;
use super::notifier;
use super::{LocalWatch, Notifier, RetryPolicy, WatchError, WatchOptions};
use crate::ext::normalize_path;
use crate::filesystem::Diff;
use crate::filter::{DefaultFilter, Filter};
use crate::watching::{NotifyBackend, SharedBackend};

/// Configures and creates a [`LocalWatch`].
///
/// ```ignore
/// let mut watch = LocalWatchBuilder::new("src")
///     .relative(true)
///     .filter(NameFilter::new(["target"], DefaultFilter))
///     .build()
///     .await?;
/// while let Some(batch) = watch.next_batch().await? {
///     for diff in batch {
///         println!("{diff}");
///     }
/// }
/// ```
pub struct LocalWatchBuilder {
    root: PathBuf,
    options: WatchOptions,
    filter: Box<dyn Filter>,
    transform: Option<Transform>,
}

impl LocalWatchBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: WatchOptions::default(),
            filter: Box::new(DefaultFilter),
            transform: None,
        }
    }

    pub fn options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn relative(mut self, relative: bool) -> Self {
        self.options.relative = relative;
        self
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.options.include_hidden = include_hidden;
        self
    }

    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.options.keep_alive = keep_alive;
        self
    }

    pub fn settle(mut self, settle: bool) -> Self {
        self.options.settle = settle;
        self
    }

    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.options.settle_delay = settle_delay;
        self
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.options.eager = eager;
        self
    }

    pub fn pending_limit(mut self, pending_limit: Option<usize>) -> Self {
        self.options.pending_limit = pending_limit;
        self
    }

    pub fn watch_retry(mut self, watch_retry: RetryPolicy) -> Self {
        self.options.watch_retry = watch_retry;
        self
    }

    /// Replaces [`DefaultFilter`].
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Rewrites every delivered entry, after relative paths were applied.
    pub fn map(mut self, transform: impl Fn(Diff) -> Diff + 'static) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Builds the watch on top of the platform's native watcher.
    pub async fn build(self) -> Result<LocalWatch, WatchError> {
        self.build_with_backend(|notifier| {
            let backend: SharedBackend = Rc::new(RefCell::new(NotifyBackend::new(notifier)?));
            Ok(backend)
        })
        .await
    }

    /// Builds the watch on top of the backend `factory` creates.
    ///
    /// The factory receives the [`Notifier`] its callbacks report through.
    pub async fn build_with_backend(
        self,
        factory: impl FnOnce(Notifier) -> notify::Result<SharedBackend>,
    ) -> Result<LocalWatch, WatchError> {
        let root = resolve_root(&self.root)?;
        debug!("Resolved watch root to {}", root.display());

        let (notifier, signals) = notifier::channel(root.clone(), self.options.pending_limit);
        let backend = factory(notifier.clone()).context(BackendSnafu)?;

        let eager = self.options.eager;
        let mut watch = LocalWatch::new(
            root,
            notifier,
            signals,
            backend,
            self.filter,
            self.transform,
            self.options,
        );
        if eager {
            watch.opened().await?;
        }

        Ok(watch)
    }
}

/// Absolute form of `root`, with symlinks resolved while it exists.
fn resolve_root(root: &Path) -> Result<PathBuf, WatchError> {
    match root.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(_) => std::path::absolute(root)
            .map(|absolute| normalize_path(&absolute))
            .context(RootPathSnafu { path: root }),
    }
}
