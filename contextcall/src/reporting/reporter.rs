//! Error reporter trait and implementations.

use super::CallFailureReport;
use parking_lot::RwLock;

/// Channel that receives failures raised by running calls.
///
/// Reporters must not panic; a failing call has already been contained by
/// the time it reaches the reporter.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorReporter: Send + Sync {
    /// Surfaces a failed invocation.
    fn report(&self, failure: &CallFailureReport);
}

/// A reporter that logs failures using the tracing framework.
///
/// This is the default reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingErrorReporter;

impl ErrorReporter for LoggingErrorReporter {
    fn report(&self, failure: &CallFailureReport) {
        tracing::error!(
            call_id = %failure.call_id,
            call_site = ?failure.call_site,
            context = %failure.captured_context,
            depth = failure.depth,
            error = %failure.error,
            "{}",
            failure.render()
        );
    }
}

/// A reporter that discards all failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpErrorReporter;

impl ErrorReporter for NoOpErrorReporter {
    fn report(&self, _failure: &CallFailureReport) {
        // Intentionally empty - discards all failures
    }
}

/// A collecting reporter for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingErrorReporter {
    failures: RwLock<Vec<CallFailureReport>>,
}

impl CollectingErrorReporter {
    /// Creates a new collecting reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected failures.
    #[must_use]
    pub fn failures(&self) -> Vec<CallFailureReport> {
        self.failures.read().clone()
    }

    /// Returns the number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.read().len()
    }

    /// Returns true if no failures have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.read().is_empty()
    }

    /// Clears all collected failures.
    pub fn clear(&self) {
        self.failures.write().clear();
    }
}

impl ErrorReporter for CollectingErrorReporter {
    fn report(&self, failure: &CallFailureReport) {
        self.failures.write().push(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::InvocationError;
    use chrono::Utc;
    use uuid::Uuid;

    fn failure(message: &str) -> CallFailureReport {
        CallFailureReport {
            call_id: Uuid::new_v4(),
            call: "<ContextCall>".to_string(),
            call_site: None,
            captured_context: "<empty context>".to_string(),
            active_context: None,
            depth: 1,
            error: InvocationError::new(message),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_noop_and_logging_reporters() {
        NoOpErrorReporter.report(&failure("ignored"));
        LoggingErrorReporter.report(&failure("logged"));
        // Should not panic
    }

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingErrorReporter::new();
        assert!(reporter.is_empty());

        reporter.report(&failure("first"));
        reporter.report(&failure("second"));
        assert_eq!(reporter.len(), 2);
        assert_eq!(reporter.failures()[1].error.message, "second");

        reporter.clear();
        assert!(reporter.is_empty());
    }
}
