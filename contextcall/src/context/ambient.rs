//! The thread-confined "currently active" context slot.

use super::ContextSnapshot;
use std::cell::RefCell;

thread_local! {
    static ACTIVE_CONTEXT: RefCell<ContextSnapshot> = RefCell::new(ContextSnapshot::empty());
}

impl ContextSnapshot {
    /// Captures the context active on the current thread.
    #[must_use]
    pub fn current() -> Self {
        ACTIVE_CONTEXT.with(|slot| slot.borrow().clone())
    }

    /// Makes this snapshot the active context and returns the previous one.
    ///
    /// Prefer [`ContextSnapshot::enter`] or [`ScopedContext`], which restore
    /// the previous context automatically.
    pub fn install(&self) -> Self {
        ACTIVE_CONTEXT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), self.clone()))
    }

    /// Runs `f` with this snapshot active, restoring the previous context
    /// afterwards, including when `f` panics.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = ScopedContext::new(self);
        f()
    }
}

/// Installs a context for the lifetime of the guard.
#[derive(Debug)]
#[must_use = "the previous context is restored as soon as the guard drops"]
pub struct ScopedContext {
    previous: Option<ContextSnapshot>,
}

impl ScopedContext {
    /// Installs `snapshot`, remembering the active context.
    pub fn new(snapshot: &ContextSnapshot) -> Self {
        Self {
            previous: Some(snapshot.install()),
        }
    }

    /// Returns the context that will be restored on drop.
    #[must_use]
    pub fn previous(&self) -> Option<&ContextSnapshot> {
        self.previous.as_ref()
    }
}

impl Drop for ScopedContext {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            previous.install();
        }
    }
}
