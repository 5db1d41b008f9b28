//! Event state machine.
//!
//! An event is reserved from a queue, optionally as the child of a parent
//! event. A child runs through launched → completed as its request is
//! dispatched and finishes. A parent completes only after its barrier has
//! been launched and every child has completed; its completion code is the
//! number of children that finished with an error (the vectored residual).

use std::sync::{Arc, Mutex};

use super::{DER_BUSY, DER_INVAL};

/// Opaque completion token reserved from an event queue.
///
/// Cheap to clone; all clones observe the same underlying state.
#[derive(Clone)]
pub struct Event {
    pub(crate) state: Arc<EventState>,
}

impl Event {
    /// Completion code: `0` on success, a negative library code on failure,
    /// or (for a parent) the number of failed children.
    pub fn completion_code(&self) -> i32 {
        self.state.completion_code()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.state.core.lock().expect("event state lock poisoned");
        f.debug_struct("Event")
            .field("launched", &core.launched)
            .field("completed", &core.completed)
            .field("rc", &core.rc)
            .finish()
    }
}

pub(crate) struct EventState {
    pub(crate) queue: u64,
    parent: Option<Arc<EventState>>,
    core: Mutex<EvCore>,
}

#[derive(Default)]
struct EvCore {
    /// A request was dispatched on this event, or the barrier was launched.
    launched: bool,
    completed: bool,
    finalized: bool,
    rc: i32,
    /// Children reserved and not yet completed.
    children_inflight: u32,
    /// Children ever reserved against this event.
    children_total: u32,
    children_failed: u32,
    barrier: bool,
}

impl EventState {
    pub(crate) fn new(queue: u64, parent: Option<Arc<EventState>>) -> Arc<Self> {
        Arc::new(Self {
            queue,
            parent,
            core: Mutex::new(EvCore::default()),
        })
    }

    /// Register one more child. Fails once the barrier has been launched.
    pub(crate) fn attach_child(&self) -> i32 {
        let mut core = self.core.lock().expect("event state lock poisoned");
        if core.barrier || core.finalized {
            return DER_INVAL;
        }
        core.children_inflight += 1;
        core.children_total += 1;
        0
    }

    pub(crate) fn mark_launched(&self) -> i32 {
        let mut core = self.core.lock().expect("event state lock poisoned");
        if core.finalized || core.completed {
            return DER_INVAL;
        }
        core.launched = true;
        0
    }

    /// Deliver the outcome of the request dispatched on this event, and
    /// propagate completion into the parent.
    pub(crate) fn complete(&self, rc: i32) {
        {
            let mut core = self.core.lock().expect("event state lock poisoned");
            core.completed = true;
            core.rc = rc;
        }
        if let Some(parent) = &self.parent {
            parent.child_completed(rc < 0);
        }
    }

    fn child_completed(&self, failed: bool) {
        let mut core = self.core.lock().expect("event state lock poisoned");
        core.children_inflight -= 1;
        if failed {
            core.children_failed += 1;
        }
        if core.barrier && core.children_inflight == 0 {
            core.completed = true;
            core.rc = core.children_failed as i32;
        }
    }

    /// Launch the parent barrier. The parent must have at least one child.
    pub(crate) fn launch_barrier(&self) -> i32 {
        let mut core = self.core.lock().expect("event state lock poisoned");
        if core.children_total == 0 || core.barrier || core.finalized {
            return DER_INVAL;
        }
        core.barrier = true;
        core.launched = true;
        if core.children_inflight == 0 {
            core.completed = true;
            core.rc = core.children_failed as i32;
        }
        0
    }

    pub(crate) fn test(&self) -> bool {
        self.core.lock().expect("event state lock poisoned").completed
    }

    /// Release the event. Fails while a request is in flight; double
    /// finalization is an error.
    pub(crate) fn finalize(&self) -> i32 {
        let mut core = self.core.lock().expect("event state lock poisoned");
        if core.launched && !core.completed {
            return DER_BUSY;
        }
        if core.finalized {
            return DER_INVAL;
        }
        core.finalized = true;
        0
    }

    pub(crate) fn completion_code(&self) -> i32 {
        self.core.lock().expect("event state lock poisoned").rc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_requires_children() {
        let parent = EventState::new(1, None);
        assert_eq!(parent.launch_barrier(), DER_INVAL);
    }

    #[test]
    fn test_parent_completes_after_barrier_and_children() {
        let parent = EventState::new(1, None);
        let child = EventState::new(1, Some(parent.clone()));
        assert_eq!(parent.attach_child(), 0);

        child.mark_launched();
        child.complete(0);
        // Children done, barrier not yet launched: parent still pending.
        assert!(!parent.test());

        assert_eq!(parent.launch_barrier(), 0);
        assert!(parent.test());
        assert_eq!(parent.completion_code(), 0);
    }

    #[test]
    fn test_failed_children_count_as_residual() {
        let parent = EventState::new(1, None);
        for rc in [0, -1005, -1005] {
            let child = EventState::new(1, Some(parent.clone()));
            parent.attach_child();
            child.mark_launched();
            child.complete(rc);
        }
        parent.launch_barrier();
        assert!(parent.test());
        assert_eq!(parent.completion_code(), 2);
    }

    #[test]
    fn test_no_children_attach_after_barrier() {
        let parent = EventState::new(1, None);
        parent.attach_child();
        let child = EventState::new(1, Some(parent.clone()));
        child.mark_launched();
        child.complete(0);
        assert_eq!(parent.launch_barrier(), 0);
        assert_eq!(parent.attach_child(), DER_INVAL);
    }

    #[test]
    fn test_finalize_inflight_is_busy() {
        let ev = EventState::new(1, None);
        ev.mark_launched();
        assert_eq!(ev.finalize(), DER_BUSY);
        ev.complete(0);
        assert_eq!(ev.finalize(), 0);
        assert_eq!(ev.finalize(), DER_INVAL);
    }
}
