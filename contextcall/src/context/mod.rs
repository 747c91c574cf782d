//! Ambient context management.
//!
//! This module provides:
//! - `ContextSnapshot`, an opaque token naming the active context
//! - The thread-confined active-context slot and `ScopedContext` guard

mod ambient;
mod snapshot;

pub use ambient::ScopedContext;
pub use snapshot::{ContextSnapshot, ContextTarget};
