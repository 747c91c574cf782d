//! Configuration for the logic thread.

use crate::errors::{ContextCallError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a logic thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicThreadConfig {
    /// Name used in logs and errors.
    #[serde(default = "default_name")]
    pub name: String,
    /// Upper bound on calls run per cycle; `None` drains the whole cycle.
    #[serde(default)]
    pub max_calls_per_cycle: Option<usize>,
    /// Invocations slower than this are logged as warnings.
    #[serde(default = "default_slow_call_threshold_ms")]
    pub slow_call_threshold_ms: Option<f64>,
    /// Whether failure reports include the context active during the run.
    #[serde(default = "default_include_context_dump")]
    pub include_context_dump: bool,
}

fn default_name() -> String {
    "logic".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_slow_call_threshold_ms() -> Option<f64> {
    Some(100.0)
}

fn default_include_context_dump() -> bool {
    true
}

impl Default for LogicThreadConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            max_calls_per_cycle: None,
            slow_call_threshold_ms: default_slow_call_threshold_ms(),
            include_context_dump: default_include_context_dump(),
        }
    }
}

impl LogicThreadConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Limits how many calls run per cycle.
    #[must_use]
    pub fn with_max_calls_per_cycle(mut self, max: usize) -> Self {
        self.max_calls_per_cycle = Some(max);
        self
    }

    /// Sets the slow-call warning threshold, or disables it with `None`.
    #[must_use]
    pub fn with_slow_call_threshold_ms(mut self, threshold_ms: Option<f64>) -> Self {
        self.slow_call_threshold_ms = threshold_ms;
        self
    }

    /// Sets whether failure reports include the active context.
    #[must_use]
    pub fn with_context_dump(mut self, include: bool) -> Self {
        self.include_context_dump = include;
        self
    }

    /// Gets the slow-call threshold as a Duration.
    #[must_use]
    pub fn slow_call_threshold(&self) -> Option<Duration> {
        self.slow_call_threshold_ms
            .map(|ms| Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }

    /// Returns true if a call taking `elapsed` exceeds the slow-call
    /// threshold.
    #[must_use]
    pub fn is_slow_call(&self, elapsed: Duration) -> bool {
        self.slow_call_threshold()
            .is_some_and(|threshold| elapsed > threshold)
    }

    /// Checks the configuration for invalid values.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ContextCallError::Config("name must not be empty".to_string()));
        }
        if self.max_calls_per_cycle == Some(0) {
            return Err(ContextCallError::Config(
                "max_calls_per_cycle must be at least 1".to_string(),
            ));
        }
        if self.slow_call_threshold_ms.is_some_and(|ms| !ms.is_finite() || ms < 0.0) {
            return Err(ContextCallError::Config(
                "slow_call_threshold_ms must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
