use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Prints file changes below a directory as they happen.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Directory to watch
    #[clap(default_value = ".")]
    pub root: PathBuf,
    /// Print paths relative to the watched directory
    #[clap(long)]
    pub relative: bool,
    /// Skip entries whose name starts with a dot
    #[clap(long)]
    pub no_hidden: bool,
    /// Check right after every event instead of waiting for a quiet period
    #[clap(long)]
    pub no_settle: bool,
    /// Quiet period before a batch is printed
    #[clap(long, value_name = "MS")]
    pub settle_delay_ms: Option<u64>,
    /// Scan the directory before waiting for the first event
    #[clap(long)]
    pub eager: bool,
    /// Exit after the first batch
    #[clap(long)]
    pub once: bool,
    /// Config file to use instead of `localwatch.yaml` in the watched directory
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}
