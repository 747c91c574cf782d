//! Registry of calls spawned by a context owner.

use super::ContextCall;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Weak list of calls created on behalf of some context owner (a session,
/// an activity, ...).
///
/// When the owner is torn down it calls [`CallRegistry::mark_all_dead`] (or
/// simply drops the registry) so that calls still referenced elsewhere, such
/// as handlers held by other systems or runs already scheduled, never execute
/// against the dead owner.
#[derive(Default)]
pub struct CallRegistry {
    calls: Mutex<Vec<Weak<ContextCall>>>,
}

impl CallRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a call. Expired entries are pruned along the way.
    pub fn register(&self, call: &Arc<ContextCall>) {
        let mut calls = self.calls.lock();
        calls.retain(|c| c.strong_count() > 0);
        calls.push(Arc::downgrade(call));
    }

    /// Returns the number of registered calls still alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.strong_count() > 0)
            .count()
    }

    /// Returns true if no registered call is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks every live registered call dead and clears the registry.
    ///
    /// Returns how many calls were marked.
    pub fn mark_all_dead(&self) -> usize {
        let calls = std::mem::take(&mut *self.calls.lock());
        let marked = calls
            .iter()
            .filter_map(Weak::upgrade)
            .inspect(|call| call.mark_dead())
            .count();
        if marked > 0 {
            debug!(marked, "Marked registered calls dead");
        }
        marked
    }
}

impl Drop for CallRegistry {
    fn drop(&mut self) {
        self.mark_all_dead();
    }
}

impl std::fmt::Debug for CallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRegistry")
            .field("live_calls", &self.len())
            .finish()
    }
}
