//! Runner configuration, loaded from TOML.
//!
//! ```toml
//! data_dir = "data"
//! cache_dir = "output/runs"
//! workers = 4
//! max_gap_secs = 60
//!
//! [broker]
//! lot_size = 1
//! leverage = 30.0
//! initial_capital = 100000.0
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ticklab_core::dataset::DEFAULT_MAX_GAP_SECS;
use ticklab_core::engine::BrokerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Directory holding `HISTDATA_COM_*` tick files.
    pub data_dir: PathBuf,
    /// Directory for persisted run records.
    pub cache_dir: PathBuf,
    /// Worker threads for batch runs; 0 means one per core.
    pub workers: usize,
    pub max_gap_secs: i64,
    /// Generate synthetic ticks when no file exists for a month.
    pub synthetic: bool,
    pub broker: BrokerConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("output/runs"),
            workers: 0,
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
            synthetic: false,
            broker: BrokerConfig::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RunnerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_gap_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "max_gap_secs must be positive, got {}",
                self.max_gap_secs
            )));
        }
        self.broker
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn max_gap(&self) -> Duration {
        Duration::seconds(self.max_gap_secs)
    }
}
