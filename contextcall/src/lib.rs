//! # Contextcall
//!
//! Callables that remember the ambient context they were created in, and a
//! single logic thread that runs them later.
//!
//! Contextcall provides:
//!
//! - **Context capture**: a [`ContextCall`](call::ContextCall) records the
//!   active context and creation site when it is built
//! - **Context restore**: running a call reinstalls its context and puts the
//!   previous one back afterwards, even when the callable fails
//! - **Deferred scheduling**: strong or weak scheduling onto the logic
//!   thread's queue
//! - **Contained failures**: invocation errors and panics are reported,
//!   never propagated to the scheduler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use contextcall::prelude::*;
//!
//! let logic = LogicThread::builder().bind()?;
//!
//! let call = ContextCall::from_fn(|_args| {
//!     println!("running in {}", ContextSnapshot::current());
//!     Ok(())
//! });
//! call.schedule_weak()?;
//!
//! logic.run_pending_calls()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod call;
pub mod callable;
pub mod context;
pub mod errors;
pub mod observability;
pub mod reporting;
pub mod scheduler;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::call::{
        call_depth, current_call, CallRegistry, CallSite, ContextCall, RunOutcome, SiteProbe,
    };
    pub use crate::callable::{CallArgs, Callable, CallableRef, FnCallable, WeakCallable};
    pub use crate::context::{ContextSnapshot, ContextTarget, ScopedContext};
    pub use crate::errors::{ContextCallError, InvocationError, Result};
    pub use crate::observability::{init_logging, LogLevel, LoggerLevels, LoggingConfig};
    pub use crate::reporting::{
        CallFailureReport, CollectingErrorReporter, ErrorReporter, LoggingErrorReporter,
        NoOpErrorReporter,
    };
    pub use crate::scheduler::{LogicThread, LogicThreadBuilder, LogicThreadConfig};
}
