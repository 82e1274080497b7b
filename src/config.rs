//! Configuration management for RollChain

use crate::blockchain::DEFAULT_DIFFICULTY;
use crate::cache::ProjectionCache;
use crate::error::{LedgerError, Result};
use crate::hierarchy::EnrollmentPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

/// Highest accepted proof-of-work target, in leading zero hex digits
pub const MAX_DIFFICULTY: u32 = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default)]
    pub enrollment_policy: EnrollmentPolicy,
    #[serde(default = "default_cache_capacity")]
    pub projection_cache_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            enrollment_policy: EnrollmentPolicy::default(),
            projection_cache_capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_path")]
    pub path: String,
    /// humantime duration such as "30s" or "5m"
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_data_path(),
            autosave_interval: default_autosave_interval(),
        }
    }
}

impl StorageConfig {
    pub fn autosave_interval(&self) -> Result<Duration> {
        humantime::parse_duration(&self.autosave_interval).map_err(|e| {
            LedgerError::Config(format!(
                "storage.autosave_interval '{}' is not a duration: {}",
                self.autosave_interval, e
            ))
        })
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DIFFICULTY).contains(&self.ledger.difficulty) {
            return Err(LedgerError::Config(format!(
                "ledger.difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.ledger.difficulty
            )));
        }

        if self.storage.backend != StorageBackend::Memory && self.storage.path.trim().is_empty() {
            return Err(LedgerError::Config(
                "storage.path must be set for file backends".to_string(),
            ));
        }

        if self.storage.autosave_interval()?.is_zero() {
            return Err(LedgerError::Config(
                "storage.autosave_interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read `config.toml` from the working directory, or defaults when absent
pub fn load_config() -> Result<Config> {
    load_config_from(CONFIG_FILE)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = fs::read_to_string(path.as_ref()).unwrap_or_default();
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_cache_capacity() -> usize {
    ProjectionCache::DEFAULT_CAPACITY
}

fn default_data_path() -> String {
    "./data/rollchain.json".to_string()
}

fn default_autosave_interval() -> String {
    "30s".to_string()
}
