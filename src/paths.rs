use anyhow::{Result, bail};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Name of the config file inside the home directory
pub const CONFIG_FILE_NAME: &str = ".chcc.yaml";

/// All computed paths used by chcc
#[derive(Debug, Clone)]
pub struct Paths {
    /// The user's home directory, if the OS reports one
    pub home: Option<PathBuf>,
    /// ~/.chcc.yaml, unless overridden with --config
    pub config_file: PathBuf,
}

impl Paths {
    /// Locate the config file, honouring a `--config` override
    pub fn resolve(config: Option<PathBuf>) -> Result<Self> {
        let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self::from_parts(home, config)
    }

    /// Compute every path relative to `home`
    pub fn from_home(home: &Path) -> Self {
        Self {
            home: Some(home.to_path_buf()),
            config_file: home.join(CONFIG_FILE_NAME),
        }
    }

    /// An explicit config file works without a home directory
    pub fn from_parts(home: Option<PathBuf>, config: Option<PathBuf>) -> Result<Self> {
        let config_file = match (config, &home) {
            (Some(config), _) => config,
            (None, Some(home)) => home.join(CONFIG_FILE_NAME),
            (None, None) => {
                bail!("Failed to determine home directory\nHint: Pass --config <PATH> to choose a config file.")
            }
        };
        Ok(Self { home, config_file })
    }
}
