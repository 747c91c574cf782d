//! Tracking of the call currently running on this thread.
//!
//! Each thread keeps its own stack of running calls. A nested run (a call
//! whose body runs another call) pushes a new frame; frames are popped by a
//! guard so the stack stays balanced even when the body panics.

use super::ContextCall;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

thread_local! {
    static ACTIVE_CALLS: RefCell<Vec<Weak<ContextCall>>> = const { RefCell::new(Vec::new()) };
}

/// Returns the call currently running on this thread, if any.
#[must_use]
pub fn current_call() -> Option<Arc<ContextCall>> {
    ACTIVE_CALLS.with(|stack| stack.borrow().last().and_then(Weak::upgrade))
}

/// Returns how many calls are running (nested) on this thread.
#[must_use]
pub fn call_depth() -> usize {
    ACTIVE_CALLS.with(|stack| stack.borrow().len())
}

/// Marks a call as running for the lifetime of the guard.
#[derive(Debug)]
pub(crate) struct ActiveCallFrame {
    depth: usize,
}

impl ActiveCallFrame {
    pub(crate) fn enter(call: Weak<ContextCall>) -> Self {
        let depth = ACTIVE_CALLS.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(call);
            stack.len()
        });
        Self { depth }
    }

    /// Nesting depth of this frame, 1 for an outermost run.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for ActiveCallFrame {
    fn drop(&mut self) {
        ACTIVE_CALLS.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "active call frames popped out of order");
            stack.truncate(self.depth - 1);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_thread_has_no_current_call() {
        assert!(current_call().is_none());
        assert_eq!(call_depth(), 0);
    }

    #[test]
    fn test_frames_nest_and_unwind() {
        let outer = ContextCall::empty();
        let inner = ContextCall::empty();
        {
            let outer_frame = ActiveCallFrame::enter(Arc::downgrade(&outer));
            assert_eq!(outer_frame.depth(), 1);
            assert!(Arc::ptr_eq(&current_call().unwrap(), &outer));
            {
                let inner_frame = ActiveCallFrame::enter(Arc::downgrade(&inner));
                assert_eq!(inner_frame.depth(), 2);
                assert!(Arc::ptr_eq(&current_call().unwrap(), &inner));
            }
            assert!(Arc::ptr_eq(&current_call().unwrap(), &outer));
        }
        assert!(current_call().is_none());
    }

    #[test]
    fn test_dropped_call_reads_as_none() {
        let call = ContextCall::empty();
        let _frame = ActiveCallFrame::enter(Arc::downgrade(&call));
        drop(call);
        assert!(current_call().is_none());
        assert_eq!(call_depth(), 1);
    }
}
