//! tickflow configuration
//!
//! Configuration is a single TOML file with one table per concern. Every
//! field has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! [scheduler]
//! initial_capacity = 128
//! max_elapsed = 0.25
//!
//! [demo]
//! ticks = 600
//! dt = 0.016
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::runtime::scheduler::SchedulerConfig;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Demo simulation settings
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Demo simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Number of ticks to simulate
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Seconds per tick
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Number of delayed effects the emitter spawns
    #[serde(default = "default_effects")]
    pub effects: usize,
}

fn default_ticks() -> u64 {
    240
}

fn default_dt() -> f64 {
    1.0 / 60.0
}

fn default_effects() -> usize {
    3
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            dt: default_dt(),
            effects: default_effects(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load configuration from a file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

/// Load configuration from `path`, or defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
