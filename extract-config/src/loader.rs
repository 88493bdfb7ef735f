//! Finds, reads, and parses the configuration document, then hands off to
//! [`crate::config::Config::compose`] for validation. Grounded on
//! `ferrex-server::infra::config::ConfigLoader`'s `with_*` builder plus
//! single `load()` entry point.

use std::fs;
use std::path::{Path, PathBuf};

use extract_core::error::ConfigError;
use thiserror::Error;

use crate::config::Config;
use crate::env::EnvConfig;
use crate::raw::FileConfig;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Loads the file config (if a path was given or a default location
    /// exists), overlays environment variables, and validates the result.
    pub fn load(&self) -> Result<Config, ConfigLoadError> {
        let file = self.load_file_config()?;
        let env = EnvConfig::gather();
        Ok(Config::compose(file, env)?)
    }

    fn load_file_config(&self) -> Result<FileConfig, ConfigLoadError> {
        let path = match &self.config_path {
            Some(path) => path.clone(),
            None => match Self::default_location() {
                Some(path) => path,
                None => return Ok(FileConfig::default()),
            },
        };
        Self::read_and_parse(&path)
    }

    fn read_and_parse(path: &Path) -> Result<FileConfig, ConfigLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn default_location() -> Option<PathBuf> {
        ["extract.toml", "config/extract.toml"]
            .into_iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
}
