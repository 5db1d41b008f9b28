//! Pool lifetime management.
//!
//! A pool is connected on construction and disconnected on drop. The
//! process-wide library init runs once, triggered by the first pool
//! connect; the matching teardown belongs to process exit. Containers hold
//! the pool through `Arc`, so the pool (and the event queue it owns)
//! outlives every container over it.

use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::event_queue::EventQueue;
use crate::raw::{self, Handle};

static LIBRARY_INIT: OnceLock<()> = OnceLock::new();

#[derive(Debug)]
pub struct Pool {
    handle: Handle,
    label: String,
    event_queue: EventQueue,
}

impl Pool {
    /// Connect to the pool named `label` and create its completion queue.
    pub fn connect(label: &str) -> Result<Arc<Self>> {
        LIBRARY_INIT.get_or_init(|| {
            raw::init();
            tracing::debug!("object store library initialized");
        });

        let handle = raw::pool_connect(label, raw::PC_RW).map_err(|code| Error::PoolConnect {
            label: label.to_string(),
            code,
        })?;
        let mut pool = Self {
            handle,
            label: label.to_string(),
            event_queue: EventQueue::new(),
        };
        pool.event_queue.initialize()?;
        tracing::debug!(pool = label, "pool connected");
        Ok(Arc::new(pool))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The pool-wide completion queue shared by its containers.
    pub fn event_queue(&self) -> &EventQueue {
        &self.event_queue
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        raw::pool_disconnect(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_drop() {
        let pool = Pool::connect("pool-basic").unwrap();
        assert_eq!(pool.label(), "pool-basic");
    }

    #[test]
    fn test_empty_label_rejected() {
        let err = Pool::connect("").unwrap_err();
        assert!(matches!(err, Error::PoolConnect { .. }));
        assert_eq!(err.code(), raw::DER_INVAL);
    }
}
