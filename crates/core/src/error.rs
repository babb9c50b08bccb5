use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::window::MAX_WINDOW_MINUTES;

/// Fatal startup errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("window start {start} must precede end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("window length must be positive, got {0} minutes")]
    NonPositive(i64),

    #[error("window of {0} minutes exceeds the maximum of {max}", max = MAX_WINDOW_MINUTES)]
    OutOfRange(i64),
}
