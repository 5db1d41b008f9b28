//! Library API surface for the object store.
//!
//! This module defines the low-level types and calls the wrapper types are
//! written against: opaque handles, 128-bit object ids, uint64 distribution
//! and attribute keys, single-value I/O descriptors, scatter-gather lists,
//! and event queues with parent/child barrier semantics. The calls are
//! served by an in-process engine ([`engine`]) that stands in for the
//! cluster-backed library, the way a mock transport would; the wrapper does
//! not depend on that and treats every call as if a network sat behind it.
//!
//! Error returns follow the library convention: `0` on success, a negative
//! `DER_*` code otherwise. Calls that produce a value return
//! `Result<T, i32>` with the code in the error position.

mod engine;
mod event;

pub use event::Event;

use engine::engine;

// ============================================================================
// Key and identifier types
// ============================================================================

/// Second level of the key hierarchy; partitions records within one object.
pub type DistributionKey = u64;

/// Third level of the key hierarchy; addresses a record within (object, dkey).
pub type AttributeKey = u64;

/// 128-bit object identifier.
///
/// The top bits of `hi` are reserved by the library to encode object type
/// and class; [`obj_generate_oid`] completes them before open when a class
/// is supplied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub lo: u64,
    pub hi: u64,
}

impl ObjectId {
    pub const fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

/// Opaque handle to a pool, container, object, or event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) u64);

pub const HANDLE_INVALID: Handle = Handle(0);

impl Handle {
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

// ============================================================================
// Object classes
// ============================================================================

/// Numeric id of an object class (redundancy/sharding template).
pub type OClassId = u16;

pub const OC_UNKNOWN: OClassId = 0;

/// Upper bound on the textual name of an object class. The library resolves
/// names into stack buffers of at most this length.
pub const OC_NAME_MAX_LENGTH: usize = 64;

const OCLASS_TABLE: &[(&str, OClassId)] = &[
    ("OC_S1", 1),
    ("OC_S2", 2),
    ("OC_S4", 3),
    ("OC_SX", 4),
    ("OC_RP_2G1", 17),
    ("OC_RP_2G2", 18),
    ("OC_RP_2GX", 19),
    ("OC_RP_3G1", 33),
    ("OC_RP_XSF", 80),
];

/// Resolve an object-class name to its id. Unknown names map to
/// [`OC_UNKNOWN`].
pub fn oclass_name2id(name: &str) -> OClassId {
    OCLASS_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
        .unwrap_or(OC_UNKNOWN)
}

/// Resolve an object-class id back to its name.
pub fn oclass_id2name(cid: OClassId) -> Option<&'static str> {
    OCLASS_TABLE.iter().find(|(_, id)| *id == cid).map(|(n, _)| *n)
}

// ============================================================================
// Error codes
// ============================================================================

pub const DER_NO_PERM: i32 = -1001;
pub const DER_NO_HDL: i32 = -1002;
pub const DER_INVAL: i32 = -1003;
pub const DER_EXIST: i32 = -1004;
pub const DER_NONEXIST: i32 = -1005;
pub const DER_BUSY: i32 = -1012;
pub const DER_REC2BIG: i32 = -2405;

/// Human-readable form of a `DER_*` code, for error messages and logs.
pub fn der_strerror(code: i32) -> &'static str {
    match code {
        0 => "success",
        DER_NO_PERM => "DER_NO_PERM: no permission",
        DER_NO_HDL => "DER_NO_HDL: invalid handle",
        DER_INVAL => "DER_INVAL: invalid parameters",
        DER_EXIST => "DER_EXIST: entity already exists",
        DER_NONEXIST => "DER_NONEXIST: nonexistent entity",
        DER_BUSY => "DER_BUSY: try again",
        DER_REC2BIG => "DER_REC2BIG: record is too large for the provided buffer",
        _ => "unknown error",
    }
}

// ============================================================================
// Flags
// ============================================================================

/// Object type bits: 64-bit integer dkeys and akeys.
pub const OT_DKEY_UINT64: u32 = 2;
pub const OT_AKEY_UINT64: u32 = 3;

/// Redundancy hint: use the container's redundancy-factor property.
pub const OCH_RDD_DEF: u32 = 1 << 0;

/// Conditional fetch: fail if the dkey / akey does not exist.
pub const COND_DKEY_FETCH: u64 = 1 << 3;
pub const COND_AKEY_FETCH: u64 = 1 << 6;

/// Pool connect and open modes.
pub const PC_RW: u32 = 1 << 1;
pub const COO_RW: u32 = 1 << 1;
pub const OO_RW: u32 = 1 << 2;

/// Record size placeholder on fetch: the library fills in the actual size.
pub const REC_ANY: u64 = 0;

/// Zero-timeout event test (non-blocking probe).
pub const EQ_NOWAIT: i64 = 0;

// ============================================================================
// I/O descriptors and scatter-gather lists
// ============================================================================

/// Record shape addressed by an I/O descriptor. Only single-value records
/// are used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IodType {
    Single,
}

/// Describes the record addressed under one attribute key: its size on
/// update, or [`REC_ANY`] on fetch (the actual size is written back).
#[derive(Debug, Clone)]
pub struct IoDescriptor {
    pub akey: AttributeKey,
    pub size: u64,
    pub kind: IodType,
}

impl IoDescriptor {
    pub fn single(akey: AttributeKey, size: u64) -> Self {
        Self {
            akey,
            size,
            kind: IodType::Single,
        }
    }
}

/// One segment of a scatter-gather list: destination memory on fetch,
/// source memory on update.
pub enum SgBuffer<'a> {
    Fetch(&'a mut [u8]),
    Update(&'a [u8]),
}

impl SgBuffer<'_> {
    pub fn len(&self) -> usize {
        match self {
            SgBuffer::Fetch(b) => b.len(),
            SgBuffer::Update(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SgBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SgBuffer::Fetch(b) => write!(f, "Fetch({} bytes)", b.len()),
            SgBuffer::Update(b) => write!(f, "Update({} bytes)", b.len()),
        }
    }
}

/// Scatter-gather list for one attribute key. `nr_out` reports how many
/// segments the library actually used on fetch.
#[derive(Debug)]
pub struct SgList<'a> {
    pub iovs: Vec<SgBuffer<'a>>,
    pub nr_out: u32,
}

impl<'a> SgList<'a> {
    pub fn new(iovs: Vec<SgBuffer<'a>>) -> Self {
        Self { iovs, nr_out: 0 }
    }

    /// Total capacity (fetch) or payload length (update) across segments.
    pub fn total_len(&self) -> usize {
        self.iovs.iter().map(|iov| iov.len()).sum()
    }
}

// ============================================================================
// Library calls
// ============================================================================

/// Process-wide library initialization. Idempotent; the matching teardown
/// happens at process exit.
pub fn init() {
    engine::init();
}

pub fn pool_connect(label: &str, flags: u32) -> Result<Handle, i32> {
    engine().pool_connect(label, flags)
}

pub fn pool_disconnect(poh: Handle) -> i32 {
    engine().pool_disconnect(poh)
}

pub fn cont_create_with_label(poh: Handle, label: &str) -> i32 {
    engine().cont_create_with_label(poh, label)
}

pub fn cont_open(poh: Handle, label: &str, flags: u32) -> Result<Handle, i32> {
    engine().cont_open(poh, label, flags)
}

pub fn cont_close(coh: Handle) -> i32 {
    engine().cont_close(coh)
}

/// Complete the reserved bits of `oid` for the given object type and class.
/// The low bits remain caller-owned.
pub fn obj_generate_oid(
    coh: Handle,
    oid: &mut ObjectId,
    otype: u32,
    cid: OClassId,
    hints: u32,
) -> i32 {
    engine().obj_generate_oid(coh, oid, otype, cid, hints)
}

pub fn obj_open(coh: Handle, oid: ObjectId, mode: u32) -> Result<Handle, i32> {
    engine().obj_open(coh, oid, mode)
}

pub fn obj_close(oh: Handle) -> i32 {
    engine().obj_close(oh)
}

/// Fetch records for `iods` under `dkey`, scattering payloads into `sgls`.
///
/// With an event, the call returns once the request is dispatched; the
/// outcome is delivered through the event. Without one, the call blocks and
/// returns the outcome directly.
pub fn obj_fetch(
    oh: Handle,
    flags: u64,
    dkey: DistributionKey,
    iods: &mut [IoDescriptor],
    sgls: &mut [SgList<'_>],
    ev: Option<&Event>,
) -> i32 {
    match ev {
        None => engine().obj_fetch(oh, flags, dkey, iods, sgls),
        Some(ev) => {
            let rc = ev.state.mark_launched();
            if rc < 0 {
                return rc;
            }
            let rc = engine().obj_fetch(oh, flags, dkey, iods, sgls);
            ev.state.complete(rc);
            0
        }
    }
}

/// Update records for `iods` under `dkey`, gathering payloads from `sgls`.
/// Event semantics match [`obj_fetch`].
pub fn obj_update(
    oh: Handle,
    flags: u64,
    dkey: DistributionKey,
    iods: &mut [IoDescriptor],
    sgls: &mut [SgList<'_>],
    ev: Option<&Event>,
) -> i32 {
    match ev {
        None => engine().obj_update(oh, flags, dkey, iods, sgls),
        Some(ev) => {
            let rc = ev.state.mark_launched();
            if rc < 0 {
                return rc;
            }
            let rc = engine().obj_update(oh, flags, dkey, iods, sgls);
            ev.state.complete(rc);
            0
        }
    }
}

pub fn eq_create() -> Result<Handle, i32> {
    engine().eq_create()
}

/// Destroy an event queue. Fails with [`DER_BUSY`] while events reserved
/// from it are still live.
pub fn eq_destroy(eqh: Handle, flags: i32) -> i32 {
    engine().eq_destroy(eqh, flags)
}

/// Reserve an event on a queue, optionally as a child of `parent`.
pub fn event_init(eqh: Handle, parent: Option<&Event>) -> Result<Event, i32> {
    engine().event_init(eqh, parent)
}

/// Release an event. Must not be called while the event is in flight.
pub fn event_fini(ev: &Event) -> i32 {
    engine().event_fini(ev)
}

/// Non-blocking completion probe. `Ok(true)` once the event completed.
pub fn event_test(ev: &Event, _timeout: i64) -> Result<bool, i32> {
    Ok(ev.state.test())
}

/// Turn `ev` into a barrier over its already-reserved children. The parent
/// completes once every child has; no further children may be attached.
pub fn event_parent_barrier(ev: &Event) -> i32 {
    ev.state.launch_barrier()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oclass_roundtrip() {
        let cid = oclass_name2id("OC_SX");
        assert_ne!(cid, OC_UNKNOWN);
        assert_eq!(oclass_id2name(cid), Some("OC_SX"));
    }

    #[test]
    fn test_oclass_unknown_name() {
        assert_eq!(oclass_name2id("OC_BOGUS"), OC_UNKNOWN);
        assert_eq!(oclass_name2id(""), OC_UNKNOWN);
    }

    #[test]
    fn test_object_id_equality_uses_both_halves() {
        let a = ObjectId::new(1, 0);
        let b = ObjectId::new(1, 2);
        assert_ne!(a, b);
        assert_eq!(a, ObjectId::new(1, 0));
    }

    #[test]
    fn test_sg_list_total_len() {
        let data = [0u8; 16];
        let mut dest = [0u8; 8];
        let sgl = SgList::new(vec![SgBuffer::Update(&data), SgBuffer::Fetch(&mut dest)]);
        assert_eq!(sgl.total_len(), 24);
    }
}
