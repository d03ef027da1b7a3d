use std::fmt;
use std::path::PathBuf;

use tracing::trace;

use super::SharedBackend;

/// One native watch, exclusively owned by a mirror-tree node.
///
/// Dropping an open handle detaches the watch as well, but the tree closes
/// handles explicitly before it forgets a node.
pub struct WatchHandle {
    path: PathBuf,
    backend: SharedBackend,
    recursive: bool,
    referenced: bool,
    open: bool,
}

impl WatchHandle {
    pub(crate) fn new(
        path: PathBuf,
        backend: SharedBackend,
        recursive: bool,
        referenced: bool,
    ) -> Self {
        Self {
            path,
            backend,
            recursive,
            referenced,
            open: true,
        }
    }

    /// Whether this watch keeps the owning engine waiting for events.
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    pub fn set_referenced(&mut self, referenced: bool) {
        self.referenced = referenced;
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        // A handle dropped while the backend is busy attaching is left to the backend
        let Ok(mut backend) = self.backend.try_borrow_mut() else {
            trace!("Backend busy, skipping detach of {}", self.path.display());
            return;
        };
        if let Err(error) = backend.unwatch(&self.path) {
            // The directory is usually gone already, which detaches the watch implicitly
            trace!("Detach of {} failed: {}", self.path.display(), error);
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("recursive", &self.recursive)
            .field("referenced", &self.referenced)
            .field("open", &self.open)
            .finish()
    }
}
