//! Test fixtures for logic-thread testing.

use std::sync::Arc;

use crate::context::ContextTarget;
use crate::errors::Result;
use crate::reporting::CollectingErrorReporter;
use crate::scheduler::{LogicThread, LogicThreadConfig};

/// A context target identified by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedContext {
    name: String,
}

impl NamedContext {
    /// Creates a shared named context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ContextTarget for NamedContext {
    fn describe(&self) -> String {
        format!("context {}", self.name)
    }
}

/// Binds the current thread as a logic thread that collects failures.
///
/// The binding is released when the fixture drops.
#[derive(Debug)]
pub struct LogicFixture {
    /// The bound logic thread.
    pub logic: LogicThread,
    /// Reporter receiving all call failures.
    pub reporter: Arc<CollectingErrorReporter>,
}

impl LogicFixture {
    /// Binds with default configuration.
    pub fn bind() -> Result<Self> {
        Self::with_config(LogicThreadConfig::default())
    }

    /// Binds with `config`.
    pub fn with_config(config: LogicThreadConfig) -> Result<Self> {
        let reporter = Arc::new(CollectingErrorReporter::new());
        let logic = LogicThread::builder()
            .config(config)
            .reporter(reporter.clone())
            .bind()?;
        Ok(Self { logic, reporter })
    }

    /// Runs cycles until the queue is empty. Returns how many calls ran.
    pub fn drain(&self) -> Result<usize> {
        let mut total = 0;
        while self.logic.pending_calls() > 0 {
            total += self.logic.run_pending_calls()?;
        }
        Ok(total)
    }
}

impl Drop for LogicFixture {
    fn drop(&mut self) {
        LogicThread::unbind_current();
    }
}
