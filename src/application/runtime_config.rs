use std::path::PathBuf;
use std::time::Duration;

use localwatch::config::WatchConfig;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub root: PathBuf,
    pub config_file: Option<PathBuf>,
    pub once: bool,
    /// Command line settings, applied over the config file.
    pub overrides: WatchConfig,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        let overrides = WatchConfig {
            relative: cli.relative.then_some(true),
            hidden: cli.no_hidden.then_some(false),
            settle: cli.no_settle.then_some(false),
            settle_delay: cli.settle_delay_ms.map(Duration::from_millis),
            eager: cli.eager.then_some(true),
            ..Default::default()
        };

        Self {
            root: cli.root,
            config_file: cli.config,
            once: cli.once,
            overrides,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use localwatch::WatchOptions;

    use super::*;

    #[test]
    fn unset_flags_leave_config_values_alone() {
        let cli = Cli::try_parse_from(["localwatch", "--no-settle"]).expect("Failed to parse arguments");
        let runtime_config = RuntimeConfig::from(cli);
        let mut options = WatchOptions {
            relative: true,
            ..Default::default()
        };

        runtime_config.overrides.apply(&mut options);

        assert!(options.relative);
        assert!(!options.settle);
        assert!(options.include_hidden);
    }
}
