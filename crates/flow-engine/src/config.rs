//! Engine configuration
//!
//! Every field has a default, so a partial or missing config file still
//! yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::store::DEFAULT_DUPLICATE_OFFSET;
use crate::history::DEFAULT_HISTORY_LIMIT;

/// File name used when a config directory is given
pub const CONFIG_FILE_NAME: &str = "flowsim.json";

/// Tunables for the store, the executor and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of undo snapshots kept
    pub history_limit: usize,
    /// Maximum number of run records kept
    pub run_history_limit: usize,
    /// Lower bound (inclusive) of the simulated per-node delay
    pub step_delay_min_ms: u64,
    /// Upper bound (exclusive) of the simulated per-node delay
    pub step_delay_max_ms: u64,
    /// Canvas offset applied to duplicated nodes
    pub duplicate_offset: f64,
    /// Directory for persisted state; persistence is off when unset
    pub state_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            run_history_limit: 50,
            step_delay_min_ms: 700,
            step_delay_max_ms: 1200,
            duplicate_offset: DEFAULT_DUPLICATE_OFFSET,
            state_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await.map_err(ConfigError::Io)?;
        let config: Self = serde_json::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file, creating parent directories
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(ConfigError::Io)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, contents).await.map_err(ConfigError::Io)?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Check the delay window is non-empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_delay_min_ms >= self.step_delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "step delay window [{}ms, {}ms) is empty",
                self.step_delay_min_ms, self.step_delay_max_ms
            )));
        }
        Ok(())
    }

    pub fn step_delay_range(&self) -> std::ops::Range<Duration> {
        Duration::from_millis(self.step_delay_min_ms)..Duration::from_millis(self.step_delay_max_ms)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
