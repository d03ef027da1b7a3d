use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

use crate::{engine::WatchOptions, ext::PathExt};

pub const CONFIG_FILE_NAME: &str = "localwatch.yaml";

const KNOWN_KEYS: [&str; 7] = [
    "relative",
    "hidden",
    "settle",
    "settle_delay_ms",
    "eager",
    "pending_limit",
    "ignore",
];

fn get_config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Settings read from `localwatch.yaml`.
///
/// Every key is optional; unset keys leave [`WatchOptions`] untouched.
/// A `pending_limit` of `0` lifts the limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    pub relative: Option<bool>,
    pub hidden: Option<bool>,
    pub settle: Option<bool>,
    pub settle_delay: Option<Duration>,
    pub eager: Option<bool>,
    pub pending_limit: Option<usize>,
    /// Entry names excluded on top of the default filter.
    pub ignore: Vec<String>,
}

impl WatchConfig {
    /// Reads `localwatch.yaml` from the watched root, if there is one.
    pub async fn read(root: &Path) -> Result<Self, WatchConfigError> {
        match Self::from_path(get_config_file_path(root)).await {
            Err(WatchConfigError::ReadError { source, .. })
                if source.kind() == ErrorKind::NotFound =>
            {
                debug!("No config file in {}, using defaults", root.display());
                Ok(Self::default())
            }
            result => result,
        }
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, WatchConfigError> {
        debug!("Reading config file: {}", path.best_effort_path_display());
        let bytes = fs::read(&path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes)
            .map_err(|error| io::Error::new(ErrorKind::InvalidData, error))
            .context(ReadSnafu {
                file_path: path.best_effort_path_display(),
            })?;
        contents.as_str().try_into()
    }

    pub fn apply(&self, options: &mut WatchOptions) {
        if let Some(relative) = self.relative {
            options.relative = relative;
        }
        if let Some(hidden) = self.hidden {
            options.include_hidden = hidden;
        }
        if let Some(settle) = self.settle {
            options.settle = settle;
        }
        if let Some(settle_delay) = self.settle_delay {
            options.settle_delay = settle_delay;
        }
        if let Some(eager) = self.eager {
            options.eager = eager;
        }
        if let Some(limit) = self.pending_limit {
            options.pending_limit = (limit > 0).then_some(limit);
        }
    }

    fn parse_top_level(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<Self, WatchConfigError> {
        for key in top_level.keys() {
            if !key.as_str().is_some_and(|key| KNOWN_KEYS.contains(&key)) {
                debug!("Skipping unknown config entry: {:?}", key);
            }
        }

        Ok(Self {
            relative: get_bool(top_level, "relative")?,
            hidden: get_bool(top_level, "hidden")?,
            settle: get_bool(top_level, "settle")?,
            settle_delay: get_count(top_level, "settle_delay_ms")?.map(Duration::from_millis),
            eager: get_bool(top_level, "eager")?,
            pending_limit: get_count(top_level, "pending_limit")?
                .map(usize::try_from)
                .transpose()
                .ok()
                .context(InvalidValueSnafu {
                    key: "pending_limit",
                })?,
            ignore: get_names(top_level, "ignore")?,
        })
    }
}

impl TryFrom<&str> for WatchConfig {
    type Error = WatchConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec = Yaml::load_from_str(contents)
            .map_err(|e| WatchConfigError::ParseError { source: e })?;
        let contents = contents_vec
            .first()
            .ok_or(WatchConfigError::MalformedConfig)?;

        let top_level = contents
            .as_mapping()
            .ok_or(WatchConfigError::TopLevelNotMap)?;

        Self::parse_top_level(top_level)
    }
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

fn get_bool(
    top_level: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<Option<bool>, WatchConfigError> {
    match top_level.get(&key(name)) {
        None | Some(Yaml::Value(Scalar::Null)) => Ok(None),
        Some(Yaml::Value(Scalar::Boolean(value))) => Ok(Some(*value)),
        Some(_) => InvalidValueSnafu { key: name }.fail(),
    }
}

fn get_count(
    top_level: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<Option<u64>, WatchConfigError> {
    match top_level.get(&key(name)) {
        None | Some(Yaml::Value(Scalar::Null)) => Ok(None),
        Some(Yaml::Value(Scalar::Integer(value))) => u64::try_from(*value)
            .ok()
            .map(Some)
            .context(InvalidValueSnafu { key: name }),
        Some(_) => InvalidValueSnafu { key: name }.fail(),
    }
}

fn get_names(
    top_level: &LinkedHashMap<Yaml, Yaml>,
    name: &'static str,
) -> Result<Vec<String>, WatchConfigError> {
    match top_level.get(&key(name)) {
        None | Some(Yaml::Value(Scalar::Null)) => Ok(Vec::new()),
        Some(Yaml::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .context(InvalidValueSnafu { key: name })
            })
            .collect(),
        Some(_) => InvalidValueSnafu { key: name }.fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum WatchConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Invalid value for '{}'", key))]
    InvalidValue { key: String },
}
