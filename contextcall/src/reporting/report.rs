//! Failure reports for calls that raised during invocation.

use crate::call::CallSite;
use crate::errors::InvocationError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use uuid::Uuid;

/// Everything known about a failed invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CallFailureReport {
    /// Id of the failing call.
    pub call_id: Uuid,
    /// Description of the failing call.
    pub call: String,
    /// Where the call was created, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_site: Option<CallSite>,
    /// Context captured when the call was created.
    pub captured_context: String,
    /// Context active while the call ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_context: Option<String>,
    /// Nesting depth of the failing run (1 for an outermost run).
    pub depth: usize,
    /// The failure itself.
    pub error: InvocationError,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl CallFailureReport {
    /// Renders the report as multi-line text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("Exception in call {}:\n", self.call);
        let site = self
            .call_site
            .as_ref()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        let _ = writeln!(out, "  created at: {site}");
        let _ = writeln!(out, "  context: {}", self.captured_context);
        if let Some(active) = &self.active_context {
            let _ = writeln!(out, "  active context: {active}");
        }
        if self.depth > 1 {
            let _ = writeln!(out, "  nested run depth: {}", self.depth);
        }
        let _ = writeln!(out, "  error: {}", self.error.message);
        if let Some(traceback) = &self.error.traceback {
            for line in traceback.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
        out
    }

    /// Serializes the report as JSON.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CallFailureReport {
        CallFailureReport {
            call_id: Uuid::nil(),
            call: "<ContextCall 00000000 from game.py:3>".to_string(),
            call_site: Some(CallSite::new("game.py", 3)),
            captured_context: "activity Lobby".to_string(),
            active_context: Some("activity Lobby".to_string()),
            depth: 1,
            error: InvocationError::new("boom").with_traceback("line 1\nline 2"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_render() {
        assert_eq!(
            sample().render(),
            "Exception in call <ContextCall 00000000 from game.py:3>:\n\
             \x20 created at: game.py:3\n\
             \x20 context: activity Lobby\n\
             \x20 active context: activity Lobby\n\
             \x20 error: boom\n\
             \x20   line 1\n\
             \x20   line 2\n"
        );
    }

    #[test]
    fn test_render_nested_without_site() {
        let mut report = sample();
        report.call_site = None;
        report.active_context = None;
        report.depth = 3;
        report.error = InvocationError::new("nope");

        let text = report.render();
        assert!(text.contains("created at: <unknown>"));
        assert!(text.contains("nested run depth: 3"));
        assert!(!text.contains("active context"));
    }

    #[test]
    fn test_to_json() {
        let json = sample().to_json().unwrap();
        assert_eq!(json["call_site"]["line"], 3);
        assert_eq!(json["error"]["message"], "boom");
        assert_eq!(json["depth"], 1);
    }
}
