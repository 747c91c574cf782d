//! Error types for contextcall.
//!
//! Only thread-affinity violations and scheduler state errors escape to
//! callers. Failures raised by a callable while it runs are captured as
//! [`InvocationError`] values and handed to the error reporting channel
//! instead of being propagated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for contextcall operations.
#[derive(Debug, Error)]
pub enum ContextCallError {
    /// A logic-thread-only operation was attempted from another thread.
    #[error("{operation} must be called from the logic thread (called from {thread})")]
    NotLogicThread {
        /// The operation that was attempted.
        operation: &'static str,
        /// Name or id of the offending thread.
        thread: String,
    },

    /// The calling thread is already bound as a logic thread.
    #[error("thread {thread} is already bound as a logic thread")]
    AlreadyBound {
        /// Name or id of the thread.
        thread: String,
    },

    /// The logic thread no longer accepts calls.
    #[error("logic thread '{name}' has shut down")]
    Shutdown {
        /// The configured logic thread name.
        name: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextCallError {
    /// Builds a thread-affinity error for the current thread.
    #[must_use]
    pub fn not_logic_thread(operation: &'static str) -> Self {
        Self::NotLogicThread {
            operation,
            thread: current_thread_label(),
        }
    }

    /// Returns true if this error is a thread-affinity violation.
    #[must_use]
    pub fn is_thread_violation(&self) -> bool {
        matches!(self, Self::NotLogicThread { .. })
    }
}

/// Returns the current thread's name, or its id if it is unnamed.
pub(crate) fn current_thread_label() -> String {
    let thread = std::thread::current();
    thread
        .name()
        .map_or_else(|| format!("{:?}", thread.id()), String::from)
}

/// A failure raised by a callable during invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct InvocationError {
    /// The error message.
    pub message: String,
    /// Foreign traceback or error chain, if the callable provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl InvocationError {
    /// Creates a new invocation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Attaches a traceback.
    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Builds an error from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "callable panicked".to_string());
        Self::new(format!("panic: {message}"))
    }
}

impl From<anyhow::Error> for InvocationError {
    fn from(err: anyhow::Error) -> Self {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let error = Self::new(err.to_string());
        if chain.is_empty() {
            error
        } else {
            error.with_traceback(chain.join("\ncaused by: "))
        }
    }
}

/// Result type alias for contextcall operations.
pub type Result<T> = std::result::Result<T, ContextCallError>;
