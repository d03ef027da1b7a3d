use std::path::{Path, PathBuf};

use derive_more::Display;

use crate::ext::PathExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum DiffKind {
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
}

/// A single change detected during a reconciliation cycle.
///
/// Only files produce diffs; directories are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{kind} {}", path.display())]
pub struct Diff {
    pub kind: DiffKind,
    pub path: PathBuf,
}

impl Diff {
    pub fn update(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: DiffKind::Update,
            path: path.into(),
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: DiffKind::Delete,
            path: path.into(),
        }
    }

    pub fn relative_to(self, root: &Path) -> Self {
        Self {
            kind: self.kind,
            path: self.path.dot_relative_to(root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_kind_then_path() {
        assert_eq!(Diff::update("/root/foo").to_string(), "update /root/foo");
        assert_eq!(Diff::delete("/root/a/b").to_string(), "delete /root/a/b");
    }

    #[test]
    fn relative_diff_starts_with_dot() {
        let diff = Diff::update("/root/a/file").relative_to(Path::new("/root"));
        assert_eq!(diff.path, PathBuf::from("./a/file"));
        assert_eq!(diff.kind, DiffKind::Update);
    }
}
