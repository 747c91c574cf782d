//! Per-target log level control.
//!
//! A `LoggerLevels` maps tracing targets to levels and renders them as
//! `EnvFilter` directives. Configs can be diffed against a base config and
//! the diff reapplied later, so hosts can persist only what a user changed.

use crate::errors::{ContextCallError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Target name that maps to the bare (default) directive.
pub const ROOT_TARGET: &str = "root";

/// A log level as used in filter directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Nothing is logged.
    Off,
    /// Errors only.
    Error,
    /// Warnings and above.
    Warn,
    /// Informational and above.
    Info,
    /// Debug and above.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// Returns the directive spelling of this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ContextCallError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(ContextCallError::Config(format!("unknown log level '{other}'"))),
        }
    }
}

/// Log levels keyed by tracing target.
///
/// Targets not present are left to the filter's default directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerLevels {
    /// Target names mapped to levels.
    #[serde(rename = "l", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub levels: BTreeMap<String, LogLevel>,
}

impl LoggerLevels {
    /// Creates an empty level map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level for a target.
    #[must_use]
    pub fn with_level(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.levels.insert(target.into(), level);
        self
    }

    /// Returns the level configured for a target.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<LogLevel> {
        self.levels.get(target).copied()
    }

    /// Returns true if no levels are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Renders the levels as comma-separated `EnvFilter` directives.
    ///
    /// The root target renders as a bare level and comes first.
    #[must_use]
    pub fn to_directives(&self) -> String {
        let root = self.get(ROOT_TARGET).map(|level| level.as_str().to_string());
        let targets = self
            .levels
            .iter()
            .filter(|(target, _)| target.as_str() != ROOT_TARGET)
            .map(|(target, level)| format!("{target}={level}"));
        root.into_iter().chain(targets).collect::<Vec<_>>().join(",")
    }

    /// Returns only the entries that differ from `base`.
    #[must_use]
    pub fn diff(&self, base: &Self) -> Self {
        let levels = self
            .levels
            .iter()
            .filter(|(target, level)| base.get(target) != Some(**level))
            .map(|(target, level)| (target.clone(), *level))
            .collect();
        Self { levels }
    }

    /// Returns a copy with `diff` overlaid.
    #[must_use]
    pub fn apply_diff(&self, diff: &Self) -> Self {
        let mut levels = self.levels.clone();
        levels.extend(diff.levels.iter().map(|(t, l)| (t.clone(), *l)));
        Self { levels }
    }

    /// Returns true if switching from `active` to these levels would change
    /// anything.
    #[must_use]
    pub fn would_change(&self, active: &Self) -> bool {
        self.levels != active.levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_levels() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" debug ".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_to_directives_puts_root_first() {
        let levels = LoggerLevels::new()
            .with_level("contextcall::scheduler", LogLevel::Trace)
            .with_level(ROOT_TARGET, LogLevel::Warn)
            .with_level("contextcall::call", LogLevel::Debug);
        assert_eq!(
            levels.to_directives(),
            "warn,contextcall::call=debug,contextcall::scheduler=trace"
        );
        assert_eq!(LoggerLevels::new().to_directives(), "");
    }

    #[test]
    fn test_diff_and_apply_diff_round_trip() {
        let base = LoggerLevels::new()
            .with_level(ROOT_TARGET, LogLevel::Info)
            .with_level("net", LogLevel::Warn);
        let changed = base
            .clone()
            .with_level("net", LogLevel::Debug)
            .with_level("audio", LogLevel::Error);

        let diff = changed.diff(&base);
        assert_eq!(
            diff,
            LoggerLevels::new()
                .with_level("net", LogLevel::Debug)
                .with_level("audio", LogLevel::Error)
        );
        assert_eq!(base.apply_diff(&diff), changed);
    }

    #[test]
    fn test_would_change() {
        let a = LoggerLevels::new().with_level("net", LogLevel::Info);
        assert!(!a.would_change(&a.clone()));
        assert!(a.would_change(&LoggerLevels::new()));
    }

    #[test]
    fn test_serde_uses_compact_key() {
        let levels = LoggerLevels::new().with_level("net", LogLevel::Debug);
        let json = serde_json::to_value(&levels).unwrap();
        assert_eq!(json, serde_json::json!({"l": {"net": "debug"}}));

        let empty = serde_json::to_value(LoggerLevels::new()).unwrap();
        assert_eq!(empty, serde_json::json!({}));
        let back: LoggerLevels = serde_json::from_value(json).unwrap();
        assert_eq!(back, levels);
    }
}
