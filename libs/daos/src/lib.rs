//! Client wrapper for a DAOS-style distributed object store.
//!
//! The store exposes a multi-level key/value hierarchy: a 128-bit object id
//! addresses an object inside a container, a 64-bit distribution key (dkey)
//! partitions records within the object, and a 64-bit attribute key (akey)
//! addresses a single-value record within one (object, dkey) pair.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Container                           │
//! │  read/write_single_akey        read_v/write_v (vectored)    │
//! └──────────────┬──────────────────────────┬───────────────────┘
//!                │                          │ coalesced per (oid, dkey)
//!                ▼                          ▼
//!         ┌────────────┐            ┌──────────────┐
//!         │   Object   │◄───────────│ EventQueue   │ parent barrier +
//!         │ fetch/upd  │  children  │ (per pool)   │ child events
//!         └──────┬─────┘            └──────┬───────┘
//!                │                         │
//!                ▼                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  raw: library API surface + in-process object store engine  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two I/O regimes exist. The synchronous single-key path issues one library
//! call without an event and blocks the caller. The vectored path dispatches
//! one asynchronous request per (object, dkey) bucket, each tied to a child
//! event of a single parent, launches the parent barrier, and spins on the
//! parent until the library reports completion.
//!
//! No ordering is promised between operations submitted in one vectored
//! call. The event queue is not safe for concurrent mutation; callers
//! serialize access to a container externally.

pub mod raw;
pub mod telemetry;

mod container;
mod error;
mod event_queue;
mod object;
mod pool;
mod request;

pub use container::{Container, RWOperation};
pub use error::{Error, Result};
pub use event_queue::EventQueue;
pub use object::{ObjClassId, Object};
pub use pool::Pool;
pub use raw::{AttributeKey, DistributionKey, Event, ObjectId, SgBuffer};
pub use request::FetchUpdateRequest;
