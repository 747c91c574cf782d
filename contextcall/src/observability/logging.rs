//! Subscriber setup for hosts that don't install their own.

use super::LoggerLevels;
use crate::errors::{ContextCallError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Configuration for the global tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base `EnvFilter` directives.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
    /// Per-target overrides appended after `filter`.
    #[serde(default)]
    pub levels: LoggerLevels,
    /// Include thread names in each line.
    #[serde(default = "default_thread_names")]
    pub thread_names: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_thread_names() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            levels: LoggerLevels::default(),
            thread_names: default_thread_names(),
        }
    }
}

impl LoggingConfig {
    /// Creates a new logging configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Sets per-target level overrides.
    #[must_use]
    pub fn with_levels(mut self, levels: LoggerLevels) -> Self {
        self.levels = levels;
        self
    }

    /// Returns the full directive string.
    #[must_use]
    pub fn directives(&self) -> String {
        let overrides = self.levels.to_directives();
        match (self.filter.trim().is_empty(), overrides.is_empty()) {
            (true, _) => overrides,
            (false, true) => self.filter.clone(),
            (false, false) => format!("{},{overrides}", self.filter),
        }
    }

    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Installs a global `tracing-subscriber` fmt subscriber.
///
/// Fails if the directives don't parse or a global subscriber is already
/// installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| ContextCallError::Config(format!("invalid log filter: {e}")))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(config.thread_names);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ContextCallError::Config(format!("failed to install subscriber: {e}")))
}
