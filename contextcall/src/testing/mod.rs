//! Testing utilities for code built on context calls.
//!
//! This module provides:
//! - Stub callables that count, fail, panic, or record what they observe
//! - A named context target and a logic-thread fixture

mod fixtures;
mod mocks;

pub use fixtures::{LogicFixture, NamedContext};
pub use mocks::{
    FailingCallable, MockCallable, ObservedRun, PanickingCallable, RecordingCallable,
    SlowCallable,
};
