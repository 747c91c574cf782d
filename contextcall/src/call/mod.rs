//! Context calls: callables that remember the context they were created in.
//!
//! This module provides:
//! - `ContextCall`, run now or scheduled onto the logic thread
//! - Active-call tracking for diagnostics
//! - Best-effort creation-site capture
//! - `CallRegistry` for neutralizing calls when their owner is torn down

mod context_call;
mod registry;
mod site;
mod tracker;

pub use context_call::{ContextCall, RunOutcome};
pub use registry::CallRegistry;
#[cfg(test)]
pub use site::MockSiteProbe;
pub use site::{clear_site_probe, install_site_probe, CallSite, SiteProbe};
pub use tracker::{call_depth, current_call};
