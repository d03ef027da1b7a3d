use std::path::{Component, Path, PathBuf};

/// Renders a path for log and error messages.
///
/// Canonicalizes when the path still exists, otherwise falls back to an
/// absolute, lexically normalized form so that vanished entries remain
/// readable in diagnostics.
pub fn best_effort_path_display(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => {
            let absolute_path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                match std::env::current_dir() {
                    Ok(current_dir) => current_dir.join(path),
                    Err(_) => path.to_path_buf(),
                }
            };

            normalize_path(&absolute_path).display().to_string()
        }
    }
}

/// Resolves `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty()
                    && !matches!(
                        components.last(),
                        Some(Component::RootDir) | Some(Component::Prefix(_))
                    )
                {
                    components.pop();
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

pub trait PathExt {
    fn best_effort_path_display(&self) -> String;

    /// Whether `self` is `root` or lies underneath it.
    fn is_rooted_in(&self, root: &Path) -> bool;

    /// Rewrites an absolute path under `root` into `./relative/form`.
    fn dot_relative_to(&self, root: &Path) -> PathBuf;

    /// Resolves `self` against `root` unless it is already absolute.
    fn resolve_against(&self, root: &Path) -> PathBuf;
}

impl PathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }

    fn is_rooted_in(&self, root: &Path) -> bool {
        self.starts_with(root)
    }

    fn dot_relative_to(&self, root: &Path) -> PathBuf {
        match self.strip_prefix(root) {
            Ok(relative) => Path::new(".").join(relative),
            Err(_) => self.to_path_buf(),
        }
    }

    fn resolve_against(&self, root: &Path) -> PathBuf {
        if self.is_absolute() {
            normalize_path(self)
        } else {
            normalize_path(&root.join(self))
        }
    }
}

impl PathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        self.as_path().best_effort_path_display()
    }

    fn is_rooted_in(&self, root: &Path) -> bool {
        self.as_path().is_rooted_in(root)
    }

    fn dot_relative_to(&self, root: &Path) -> PathBuf {
        self.as_path().dot_relative_to(root)
    }

    fn resolve_against(&self, root: &Path) -> PathBuf {
        self.as_path().resolve_against(root)
    }
}
