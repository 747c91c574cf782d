//! Callable trait and implementations.
//!
//! A callable is an opaque, reference-counted invocable value owned by the
//! host. Each foreign value kind (a Rust closure, a weak handle to another
//! callable, a Python object, ...) gets its own implementation.

mod args;

pub use args::CallArgs;

use crate::errors::InvocationError;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// Shared handle to a callable.
pub type CallableRef = Arc<dyn Callable>;

/// Trait for invocable values.
pub trait Callable: Send + Sync + Debug {
    /// Invokes the callable.
    ///
    /// # Arguments
    ///
    /// * `args` - Positional arguments, or `None` to invoke with no arguments
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError>;

    /// Returns false once the underlying value can no longer be invoked.
    fn is_resolvable(&self) -> bool {
        true
    }

    /// Returns a short human-readable description.
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

/// A simple function-based callable.
pub struct FnCallable<F>
where
    F: Fn(Option<&CallArgs>) -> anyhow::Result<()> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnCallable<F>
where
    F: Fn(Option<&CallArgs>) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based callable.
    pub fn new(func: F) -> Self {
        Self::named("<closure>", func)
    }

    /// Creates a function-based callable with a descriptive name.
    pub fn named(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnCallable<F>
where
    F: Fn(Option<&CallArgs>) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCallable")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> Callable for FnCallable<F>
where
    F: Fn(Option<&CallArgs>) -> anyhow::Result<()> + Send + Sync,
{
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError> {
        (self.func)(args).map_err(InvocationError::from)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// A non-owning handle to a callable owned elsewhere.
///
/// Stops resolving once every owning reference to the target is dropped.
#[derive(Debug, Clone)]
pub struct WeakCallable {
    target: Weak<dyn Callable>,
}

impl WeakCallable {
    /// Creates a weak handle to `target`.
    #[must_use]
    pub fn new(target: &CallableRef) -> Self {
        Self {
            target: Arc::downgrade(target),
        }
    }
}

impl Callable for WeakCallable {
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError> {
        self.target
            .upgrade()
            .ok_or_else(|| InvocationError::new("weak callable target has expired"))?
            .invoke(args)
    }

    fn is_resolvable(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn describe(&self) -> String {
        self.target
            .upgrade()
            .map_or_else(|| "<expired>".to_string(), |target| format!("weak {}", target.describe()))
    }
}
