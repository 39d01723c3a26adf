use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "ant.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Scheduler priority of re-renders triggered by state writes
    #[serde(default = "default_render_priority")]
    pub render_priority: i32,

    /// Selector of the application mount root
    #[serde(default = "default_mount_selector")]
    pub mount_selector: String,

    /// Recycled elements kept per tag
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity_per_tag: usize,

    /// Slice length granted by hosts without a native idle callback
    #[serde(default = "default_idle_slice_budget")]
    pub idle_slice_budget_ms: u64,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_render_priority() -> i32 {
    1
}

fn default_mount_selector() -> String {
    "#app".to_string()
}

fn default_pool_capacity() -> usize {
    ant_dom::pool::DEFAULT_CAPACITY_PER_TAG
}

fn default_idle_slice_budget() -> u64 {
    16
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeConfig {
    /// Load config from a directory, falling back to defaults when no file exists
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            render_priority: default_render_priority(),
            mount_selector: default_mount_selector(),
            pool_capacity_per_tag: default_pool_capacity(),
            idle_slice_budget_ms: default_idle_slice_budget(),
            metrics_enabled: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
