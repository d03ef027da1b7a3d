use std::path::PathBuf;

use snafu::Snafu;

use crate::ext::PathExt;
use crate::filesystem::StatError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WatchError {
    #[snafu(display("Failed to resolve watch root {}", path.display()))]
    RootPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Watch root is unavailable"))]
    RootUnavailable { source: StatError },

    #[snafu(display(
        "Watch root {} is not a directory",
        path.best_effort_path_display()
    ))]
    RootNotDirectory { path: PathBuf },

    #[snafu(display("Failed to create native watcher"))]
    Backend { source: notify::Error },

    #[snafu(display("Watch failed to open earlier: {message}"))]
    OpenFailed { message: String },

    #[snafu(display("Watch was closed before it opened"))]
    Closed,
}
