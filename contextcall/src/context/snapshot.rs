//! Context snapshots.

use std::fmt;
use std::sync::{Arc, Weak};

/// Something a context snapshot can point at (an activity, a session, a UI
/// scope, ...).
///
/// Targets are owned by the host; snapshots only hold weak references, so a
/// snapshot never keeps its target alive.
pub trait ContextTarget: Send + Sync + fmt::Debug {
    /// Returns a human-readable description for diagnostics.
    fn describe(&self) -> String;
}

/// An opaque token naming which ambient context was active.
///
/// Snapshots are cheap to clone. Two snapshots are equal when they point at
/// the same target (or are both empty).
#[derive(Clone, Default)]
pub struct ContextSnapshot {
    target: Option<Weak<dyn ContextTarget>>,
}

impl ContextSnapshot {
    /// Creates a snapshot naming no context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot pointing at `target`.
    #[must_use]
    pub fn of<T: ContextTarget + 'static>(target: &Arc<T>) -> Self {
        let target: Arc<dyn ContextTarget> = target.clone();
        Self::from_shared(&target)
    }

    /// Creates a snapshot from an already type-erased target.
    #[must_use]
    pub fn from_shared(target: &Arc<dyn ContextTarget>) -> Self {
        Self {
            target: Some(Arc::downgrade(target)),
        }
    }

    /// Returns the target if it is still alive.
    #[must_use]
    pub fn target(&self) -> Option<Arc<dyn ContextTarget>> {
        self.target.as_ref().and_then(Weak::upgrade)
    }

    /// Returns true if this snapshot names no context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
    }

    /// Returns true if this snapshot named a context that has since died.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.strong_count() == 0)
    }

    /// Describes the snapshot for diagnostics.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.target {
            None => "<empty context>".to_string(),
            Some(weak) => weak
                .upgrade()
                .map_or_else(|| "<expired context>".to_string(), |t| t.describe()),
        }
    }
}

impl PartialEq for ContextSnapshot {
    fn eq(&self, other: &Self) -> bool {
        match (&self.target, &other.target) {
            (None, None) => true,
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for ContextSnapshot {}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextSnapshot")
            .field(&self.description())
            .finish()
    }
}

impl fmt::Display for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
