//! Observability utilities.

mod log_control;
mod logging;
mod timing;

pub use log_control::{LogLevel, LoggerLevels, ROOT_TARGET};
pub use logging::{init_logging, LoggingConfig};
pub use timing::SpanTimer;
