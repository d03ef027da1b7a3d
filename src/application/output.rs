use std::io::{self, Write};

use colored::Colorize;
use localwatch::{Diff, DiffKind};
use supports_color::Stream;

/// Writes delivered batches to stdout, one line per entry.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    color: bool,
}

impl Output {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    pub fn detect() -> Self {
        Self::new(supports_color::on(Stream::Stdout).is_some())
    }

    pub fn format(&self, diff: &Diff) -> String {
        if !self.color {
            return diff.to_string();
        }

        let kind = match diff.kind {
            DiffKind::Update => diff.kind.to_string().green(),
            DiffKind::Delete => diff.kind.to_string().red(),
        };
        format!("{} {}", kind.bold(), diff.path.display())
    }

    /// Prints `batch`, followed by an empty line separating it from the next.
    pub fn print_batch(&self, batch: &[Diff]) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for diff in batch {
            writeln!(stdout, "{}", self.format(diff))?;
        }
        writeln!(stdout)?;
        stdout.flush()
    }
}
