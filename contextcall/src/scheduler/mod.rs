//! The logic thread: a single designated thread with a FIFO queue of
//! deferred calls.
//!
//! This module provides:
//! - `LogicThread` for binding, feeding and draining the logic thread
//! - `LogicThreadConfig` for its serde-loadable configuration

mod config;
mod logic;

pub use config::LogicThreadConfig;
pub use logic::{LogicStats, LogicThread, LogicThreadBuilder, PendingCall};
