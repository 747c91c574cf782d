//! Stub callables for testing.

use parking_lot::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::call::{call_depth, current_call};
use crate::callable::{CallArgs, Callable};
use crate::context::ContextSnapshot;
use crate::errors::InvocationError;

/// A callable that counts invocations and returns a configurable result.
#[derive(Debug, Default)]
pub struct MockCallable {
    failure: Mutex<Option<String>>,
    calls: Mutex<Vec<Option<CallArgs>>>,
}

impl MockCallable {
    /// Creates a new mock callable that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent invocations fail with `message`, or succeed again
    /// with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(String::from);
    }

    /// Returns the number of times the callable was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Returns the arguments of each invocation.
    #[must_use]
    pub fn recorded_args(&self) -> Vec<Option<CallArgs>> {
        self.calls.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl Callable for MockCallable {
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError> {
        self.calls.lock().push(args.cloned());
        match self.failure.lock().as_deref() {
            Some(message) => Err(InvocationError::new(message)),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// A callable that always fails.
#[derive(Debug)]
pub struct FailingCallable {
    error: InvocationError,
}

impl FailingCallable {
    /// Creates a callable failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: InvocationError::new(message),
        }
    }

    /// Creates a callable failing with `message` and a traceback.
    #[must_use]
    pub fn with_traceback(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            error: InvocationError::new(message).with_traceback(traceback),
        }
    }
}

impl Callable for FailingCallable {
    fn invoke(&self, _args: Option<&CallArgs>) -> Result<(), InvocationError> {
        Err(self.error.clone())
    }
}

/// A callable that panics.
#[derive(Debug)]
pub struct PanickingCallable {
    message: String,
}

impl PanickingCallable {
    /// Creates a callable panicking with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Callable for PanickingCallable {
    fn invoke(&self, _args: Option<&CallArgs>) -> Result<(), InvocationError> {
        panic!("{}", self.message)
    }
}

/// A callable that blocks for a fixed time.
#[derive(Debug)]
pub struct SlowCallable {
    delay: Duration,
}

impl SlowCallable {
    /// Creates a slow callable with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
        }
    }
}

impl Callable for SlowCallable {
    fn invoke(&self, _args: Option<&CallArgs>) -> Result<(), InvocationError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

/// What a [`RecordingCallable`] observed during one invocation.
#[derive(Debug, Clone)]
pub struct ObservedRun {
    /// The context active during the invocation.
    pub context: ContextSnapshot,
    /// Id of the call reported as currently running.
    pub current_call: Option<Uuid>,
    /// Active-call nesting depth.
    pub depth: usize,
    /// Arguments passed.
    pub args: Option<CallArgs>,
}

/// A callable that records the ambient state it runs in.
#[derive(Debug, Default)]
pub struct RecordingCallable {
    runs: Mutex<Vec<ObservedRun>>,
}

impl RecordingCallable {
    /// Creates a new recording callable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded runs.
    #[must_use]
    pub fn runs(&self) -> Vec<ObservedRun> {
        self.runs.lock().clone()
    }

    /// Returns the number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }
}

impl Callable for RecordingCallable {
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError> {
        self.runs.lock().push(ObservedRun {
            context: ContextSnapshot::current(),
            current_call: current_call().map(|call| call.id()),
            depth: call_depth(),
            args: args.cloned(),
        });
        Ok(())
    }
}
