//! Error reporting channel for contained invocation failures.

mod report;
mod reporter;

pub use report::CallFailureReport;
#[cfg(test)]
pub use reporter::MockErrorReporter;
pub use reporter::{
    CollectingErrorReporter, ErrorReporter, LoggingErrorReporter, NoOpErrorReporter,
};
