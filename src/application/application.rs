use snafu::prelude::*;
use tracing::{debug, info};

use localwatch::config::{WatchConfig, WatchConfigError};
use localwatch::filter::{DefaultFilter, NameFilter};
use localwatch::{LocalWatchBuilder, WatchError, WatchOptions};

use crate::application::{Output, RuntimeConfig};

pub struct Application;

impl Application {
    pub async fn run(runtime_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let runtime_config: RuntimeConfig = runtime_config.into();
        let config = match &runtime_config.config_file {
            Some(path) => WatchConfig::from_path(path.clone()).await,
            None => WatchConfig::read(&runtime_config.root).await,
        }
        .context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let mut options = WatchOptions::default();
        config.apply(&mut options);
        runtime_config.overrides.apply(&mut options);
        debug!("Effective watch options: {:?}", options);

        let mut watch = LocalWatchBuilder::new(&runtime_config.root)
            .options(options)
            .filter(NameFilter::new(config.ignore, DefaultFilter))
            .build()
            .await
            .context(WatchSnafu)?;
        watch.opened().await.context(WatchSnafu)?;
        info!("Tracking {} paths", watch.watching().count());

        let output = Output::detect();
        while let Some(batch) = watch.next_batch().await.context(WatchSnafu)? {
            output.print_batch(&batch).context(OutputSnafu)?;
            if runtime_config.once {
                break;
            }
        }

        watch.close();
        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while loading the config file"))]
    ConfigError { source: WatchConfigError },
    #[snafu(display("Critical failure encountered while watching"))]
    WatchError { source: WatchError },
    #[snafu(display("Failed to write changes to stdout"))]
    OutputError { source: std::io::Error },
}
