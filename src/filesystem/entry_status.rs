use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compio::fs;
use derive_more::Display;
use snafu::{ResultExt, Snafu};

use crate::ext::{AsyncTryFrom, PathExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntryKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

/// What the mirror tree remembers about an entry between observations.
///
/// Symlinks are not followed, so a link to a directory is recorded as a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStatus {
    pub kind: EntryKind,
    pub modified_at: Option<SystemTime>,
}

impl EntryStatus {
    pub fn file(modified_at: Option<SystemTime>) -> Self {
        Self {
            kind: EntryKind::File,
            modified_at,
        }
    }

    pub fn directory(modified_at: Option<SystemTime>) -> Self {
        Self {
            kind: EntryKind::Directory,
            modified_at,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

impl AsyncTryFrom<&Path> for EntryStatus {
    type Error = StatError;

    async fn async_try_from(path: &Path) -> Result<Self, Self::Error> {
        let metadata = fs::symlink_metadata(path).await.context(StatSnafu {
            path: path.to_path_buf(),
        })?;

        let modified_at = metadata.modified().ok();
        Ok(if metadata.is_dir() {
            EntryStatus::directory(modified_at)
        } else {
            EntryStatus::file(modified_at)
        })
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Failed to stat {}", path.best_effort_path_display()))]
pub struct StatError {
    path: PathBuf,
    source: std::io::Error,
}

impl StatError {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[compio::test]
    async fn status_of_regular_file() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");

        let status = EntryStatus::async_try_from(temp_file.path())
            .await
            .expect("Failed to stat temp file");

        assert_eq!(status.kind, EntryKind::File);
        assert!(status.modified_at.is_some());
    }

    #[compio::test]
    async fn status_of_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let status = EntryStatus::async_try_from(temp_dir.path())
            .await
            .expect("Failed to stat temp directory");

        assert!(status.is_directory());
    }

    #[compio::test]
    async fn missing_entry_reports_its_path() {
        let missing = Path::new("/this/path/does/not/exist.txt");

        let error = EntryStatus::async_try_from(missing)
            .await
            .expect_err("Stat of a missing path should fail");

        assert_eq!(error.path(), missing);
        assert!(error.to_string().contains("Failed to stat"));
    }

    #[cfg(unix)]
    #[compio::test]
    async fn symlinks_are_not_followed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(temp_dir.path(), &link).expect("Failed to create symlink");

        let status = EntryStatus::async_try_from(link.as_path())
            .await
            .expect("Failed to stat symlink");

        assert_eq!(status.kind, EntryKind::File);
    }
}
