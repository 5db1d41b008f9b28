//! Completion queue wrapper.
//!
//! One queue exists per pool. Events are reserved from the queue, optionally
//! as children of a parent event; a parent turned into a barrier completes
//! once every child has. Completion is observed by polling: a tight spin on
//! the library's zero-timeout test call. The library is event-driven by
//! design and the cooperative spin keeps the caller simple; a bounded wait
//! would not change the semantics.

use crate::error::{Error, Result};
use crate::raw::{self, Event, Handle, EQ_NOWAIT, HANDLE_INVALID};

#[derive(Debug)]
pub struct EventQueue {
    handle: Handle,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self {
            handle: HANDLE_INVALID,
        }
    }

    /// Create the underlying completion queue.
    pub fn initialize(&mut self) -> Result<()> {
        let handle = raw::eq_create().map_err(|code| Error::StorageUnavailable { code })?;
        self.handle = handle;
        Ok(())
    }

    /// Reserve an event on this queue, optionally as a child of `parent`.
    /// Child completions are inherited into the parent.
    pub fn reserve_event(&self, parent: Option<&Event>) -> Result<Event> {
        raw::event_init(self.handle, parent).map_err(|code| Error::Io { code })
    }

    /// Release an event. Only valid after its completion has been observed.
    pub fn finalize_event(&self, ev: Event) -> i32 {
        raw::event_fini(&ev)
    }

    /// Declare `parent` a barrier over its already-reserved children. No
    /// further children may be attached afterwards.
    pub fn launch_parent_barrier(&self, parent: &Event) -> i32 {
        raw::event_parent_barrier(parent)
    }

    /// Busy-wait on `ev` until the library reports completion, then finalize
    /// it. Returns the event's completion code (for a parent: the number of
    /// failed children), or a negative library code if the test or the
    /// finalization itself failed.
    pub fn poll_to_completion(&self, ev: Event) -> i32 {
        loop {
            match raw::event_test(&ev, EQ_NOWAIT) {
                Err(code) => return code,
                Ok(true) => break,
                Ok(false) => std::hint::spin_loop(),
            }
        }
        let rc = ev.completion_code();
        let fini = raw::event_fini(&ev);
        if fini < 0 {
            return fini;
        }
        rc
    }

    /// Destroy the queue. Fails with the library's busy code while events
    /// reserved from it are still live.
    pub fn destroy(&mut self) -> i32 {
        if !self.handle.is_valid() {
            return 0;
        }
        let rc = raw::eq_destroy(self.handle, 0);
        if rc == 0 {
            self.handle = HANDLE_INVALID;
        }
        rc
    }
}

impl Drop for EventQueue {
    fn drop(&mut self) {
        let rc = self.destroy();
        if rc < 0 {
            tracing::warn!(code = rc, "event queue destroyed with outstanding events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_and_destroy() {
        let mut queue = EventQueue::new();
        queue.initialize().unwrap();
        assert_eq!(queue.destroy(), 0);
    }

    #[test]
    fn test_poll_parent_with_completed_children() {
        let mut queue = EventQueue::new();
        queue.initialize().unwrap();

        let parent = queue.reserve_event(None).unwrap();
        let children: Vec<Event> = (0..3)
            .map(|_| queue.reserve_event(Some(&parent)).unwrap())
            .collect();
        for child in &children {
            child.state.mark_launched();
            child.state.complete(0);
        }
        assert_eq!(queue.launch_parent_barrier(&parent), 0);
        assert_eq!(queue.poll_to_completion(parent), 0);
        for child in children {
            assert_eq!(queue.finalize_event(child), 0);
        }
        assert_eq!(queue.destroy(), 0);
    }

    #[test]
    fn test_destroy_with_reserved_event_fails() {
        let mut queue = EventQueue::new();
        queue.initialize().unwrap();
        let ev = queue.reserve_event(None).unwrap();
        assert!(queue.destroy() < 0);
        assert_eq!(queue.finalize_event(ev), 0);
        assert_eq!(queue.destroy(), 0);
    }
}
