//! Error types for the profile store and the environment propagator.
//!
//! Command handlers wrap these in `anyhow::Error` with extra context; the
//! typed variants exist so callers (and tests) can tell a missing home
//! directory apart from a corrupt config file.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the configuration file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Failures that abort environment propagation
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("failed to determine home directory")]
    HomeDirUnavailable,

    #[error("unsupported platform '{0}': set the environment variables manually")]
    UnsupportedPlatform(String),

    #[error("value for {var} contains a NUL byte and cannot be exported")]
    InvalidValue { var: &'static str },
}
