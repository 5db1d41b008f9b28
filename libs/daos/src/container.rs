//! Read/write access to objects in a container.
//!
//! Single-key operations open a transient object, issue one synchronous
//! library call, and return. Vectored operations coalesce the batch per
//! (object id, dkey) bucket: the library accepts multiple akeys per fetch
//! or update, so coalescing cuts the request count linearly in the number of
//! columns sharing a distribution key. Each bucket is dispatched
//! asynchronously under one parent barrier and the parent is polled.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::event_queue::EventQueue;
use crate::object::{ObjClassId, Object};
use crate::pool::Pool;
use crate::raw::{self, AttributeKey, DistributionKey, Handle, ObjectId, SgBuffer};
use crate::request::FetchUpdateRequest;

/// Fetch or update, selected by the caller of the vectored routine.
type IoFn = for<'r, 's, 'b> fn(&'r Object, &'s mut FetchUpdateRequest<'b>) -> i32;

// ============================================================================
// RWOperation
// ============================================================================

/// One single-key operation inside a vectored batch.
pub struct RWOperation<'a> {
    pub oid: ObjectId,
    pub dkey: DistributionKey,
    pub akey: AttributeKey,
    pub buf: SgBuffer<'a>,
}

impl<'a> RWOperation<'a> {
    pub fn read(
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
        buf: &'a mut [u8],
    ) -> Self {
        Self {
            oid,
            dkey,
            akey,
            buf: SgBuffer::Fetch(buf),
        }
    }

    pub fn write(
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
        buf: &'a [u8],
    ) -> Self {
        Self {
            oid,
            dkey,
            akey,
            buf: SgBuffer::Update(buf),
        }
    }
}

/// Merge a batch into one bucket per `(oid, dkey)`, preserving insertion
/// order both across buckets and within each bucket's akeys.
pub(crate) fn coalesce(
    ops: Vec<RWOperation<'_>>,
) -> Vec<((ObjectId, DistributionKey), Vec<(AttributeKey, SgBuffer<'_>)>)> {
    let mut buckets: Vec<((ObjectId, DistributionKey), Vec<(AttributeKey, SgBuffer<'_>)>)> =
        Vec::new();
    let mut index: HashMap<(ObjectId, DistributionKey), usize> = HashMap::new();
    for op in ops {
        let key = (op.oid, op.dkey);
        match index.get(&key) {
            Some(&i) => buckets[i].1.push((op.akey, op.buf)),
            None => {
                index.insert(key, buckets.len());
                buckets.push((key, vec![(op.akey, op.buf)]));
            }
        }
    }
    buckets
}

// ============================================================================
// Container
// ============================================================================

/// An open container in a pool. Holds a shared reference to the pool so the
/// pool (and its event queue) outlives every container over it.
pub struct Container {
    handle: Handle,
    label: String,
    pool: Arc<Pool>,
    default_class: ObjClassId,
}

impl Container {
    /// Open `label` in `pool`, creating it first when `create` is set.
    /// Creation tolerates exactly one soft error, the label already
    /// existing, and proceeds to open.
    pub fn open(pool: Arc<Pool>, label: &str, create: bool) -> Result<Self> {
        if create {
            let rc = raw::cont_create_with_label(pool.handle(), label);
            if rc != 0 && rc != raw::DER_EXIST {
                return Err(Error::ContainerOpen {
                    label: label.to_string(),
                    code: rc,
                });
            }
        }
        let handle = raw::cont_open(pool.handle(), label, raw::COO_RW).map_err(|code| {
            Error::ContainerOpen {
                label: label.to_string(),
                code,
            }
        })?;
        tracing::debug!(container = label, pool = pool.label(), "container opened");
        Ok(Self {
            handle,
            label: label.to_string(),
            pool,
            default_class: ObjClassId::from_name("OC_SX"),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn default_object_class(&self) -> ObjClassId {
        self.default_class
    }

    /// Class applied to objects when the caller does not name one.
    pub fn set_default_object_class(&mut self, cid: ObjClassId) {
        self.default_class = cid;
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    fn queue(&self) -> &EventQueue {
        self.pool.event_queue()
    }

    // ------------------------------------------------------------------
    // Single-key operations
    // ------------------------------------------------------------------

    /// Read the record at `(oid, dkey, akey)` into `buf`. Returns the number
    /// of bytes the record actually held.
    pub fn read_single_akey(
        &self,
        buf: &mut [u8],
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
    ) -> Result<usize> {
        self.read_single_akey_with_class(buf, oid, dkey, akey, self.default_class)
    }

    pub fn read_single_akey_with_class(
        &self,
        buf: &mut [u8],
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
        cid: ObjClassId,
    ) -> Result<usize> {
        let mut request = FetchUpdateRequest::single(dkey, akey, vec![SgBuffer::Fetch(buf)], None);
        let object = Object::open(self, oid, cid)?;
        let rc = object.fetch(&mut request);
        if rc < 0 {
            return Err(Error::Io { code: rc });
        }
        Ok(request.record_size(0) as usize)
    }

    /// Write `data` as the record at `(oid, dkey, akey)`.
    pub fn write_single_akey(
        &self,
        data: &[u8],
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
    ) -> Result<()> {
        self.write_single_akey_with_class(data, oid, dkey, akey, self.default_class)
    }

    pub fn write_single_akey_with_class(
        &self,
        data: &[u8],
        oid: ObjectId,
        dkey: DistributionKey,
        akey: AttributeKey,
        cid: ObjClassId,
    ) -> Result<()> {
        let mut request =
            FetchUpdateRequest::single(dkey, akey, vec![SgBuffer::Update(data)], None);
        let object = Object::open(self, oid, cid)?;
        let rc = object.update(&mut request);
        if rc < 0 {
            return Err(Error::Io { code: rc });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Vectored operations
    // ------------------------------------------------------------------

    /// Vectored read. Returns the residual: the number of coalesced
    /// requests that did not complete (0 after a successful call).
    pub fn read_v(&self, ops: Vec<RWOperation<'_>>) -> Result<usize> {
        self.read_v_with_class(ops, self.default_class)
    }

    pub fn read_v_with_class(&self, ops: Vec<RWOperation<'_>>, cid: ObjClassId) -> Result<usize> {
        self.vector_io(ops, cid, Object::fetch)
    }

    /// Vectored write. Residual semantics match [`Container::read_v`].
    pub fn write_v(&self, ops: Vec<RWOperation<'_>>) -> Result<usize> {
        self.write_v_with_class(ops, self.default_class)
    }

    pub fn write_v_with_class(&self, ops: Vec<RWOperation<'_>>, cid: ObjClassId) -> Result<usize> {
        self.vector_io(ops, cid, Object::update)
    }

    /// The vectored core: coalesce per (oid, dkey), one transient object and
    /// one child event per bucket, all children under one parent barrier,
    /// then poll the parent. No ordering is promised across buckets; within
    /// a bucket, akey order equals insertion order.
    ///
    /// A synchronous dispatch error aborts the batch early with the library
    /// code. Per-bucket failures after dispatch are not separated here; they
    /// surface as a non-zero residual.
    fn vector_io(&self, ops: Vec<RWOperation<'_>>, cid: ObjClassId, io: IoFn) -> Result<usize> {
        if ops.is_empty() {
            return Ok(0);
        }

        let queue = self.queue();
        let parent = queue.reserve_event(None)?;
        let buckets = coalesce(ops);
        tracing::trace!(
            container = %self.label,
            n_buckets = buckets.len(),
            "dispatching vectored operation"
        );

        let mut requests: Vec<(Object, FetchUpdateRequest<'_>)> =
            Vec::with_capacity(buckets.len());
        for ((oid, dkey), items) in buckets {
            let child = queue.reserve_event(Some(&parent))?;
            let object = Object::open(self, oid, cid)?;
            requests.push((object, FetchUpdateRequest::multi(dkey, items, Some(child))));

            let (object, request) = requests.last_mut().unwrap();
            let rc = io(object, request);
            if rc < 0 {
                return Err(Error::Io { code: rc });
            }
        }

        let rc = queue.launch_parent_barrier(&parent);
        if rc < 0 {
            return Err(Error::Io { code: rc });
        }
        let residual = queue.poll_to_completion(parent);
        if residual < 0 {
            return Err(Error::Io { code: residual });
        }

        // Completion observed; release the children's queue slots.
        for (_, request) in requests.iter_mut() {
            if let Some(ev) = request.take_event() {
                queue.finalize_event(ev);
            }
        }
        Ok(residual as usize)
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        raw::cont_close(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_container(pool: &str, label: &str) -> Container {
        let pool = Pool::connect(pool).unwrap();
        Container::open(pool, label, true).unwrap()
    }

    #[test]
    fn test_create_existing_container_succeeds() {
        let pool = Pool::connect("cont-pool-exist").unwrap();
        let first = Container::open(pool.clone(), "c", true).unwrap();
        drop(first);
        // Second create sees DER_EXIST and proceeds.
        let second = Container::open(pool, "c", true).unwrap();
        assert_eq!(second.label(), "c");
    }

    #[test]
    fn test_single_akey_roundtrip() -> anyhow::Result<()> {
        let container = open_test_container("cont-pool-rt", "c");
        let oid = ObjectId::new(100, 0);
        container.write_single_akey(b"payload", oid, 1, 2)?;

        let mut buf = vec![0u8; 32];
        let n = container.read_single_akey(&mut buf, oid, 1, 2)?;
        assert_eq!(&buf[..n], b"payload");
        Ok(())
    }

    #[test]
    fn test_read_missing_key_fails_with_library_code() {
        let container = open_test_container("cont-pool-miss", "c");
        let mut buf = vec![0u8; 8];
        let err = container
            .read_single_akey(&mut buf, ObjectId::new(1, 0), 1, 1)
            .unwrap_err();
        assert_eq!(err.code(), raw::DER_NONEXIST);
    }

    #[test]
    fn test_coalesce_two_akeys_one_bucket() {
        let oid = ObjectId::new(0xa, 0);
        let b1 = [1u8; 4];
        let b2 = [2u8; 8];
        let ops = vec![
            RWOperation::write(oid, 7, 1, &b1),
            RWOperation::write(oid, 7, 2, &b2),
        ];
        let buckets = coalesce(ops);
        assert_eq!(buckets.len(), 1);
        let ((bucket_oid, dkey), items) = &buckets[0];
        assert_eq!(*bucket_oid, oid);
        assert_eq!(*dkey, 7);
        let akeys: Vec<_> = items.iter().map(|(akey, _)| *akey).collect();
        assert_eq!(akeys, vec![1, 2]);
        let sizes: Vec<_> = items.iter().map(|(_, buf)| buf.len()).collect();
        assert_eq!(sizes, vec![4, 8]);
    }

    #[test]
    fn test_coalesce_mixed_buckets() {
        let a = ObjectId::new(0xa, 0);
        let b = ObjectId::new(0xb, 0);
        let buf = [0u8; 2];
        let ops = vec![
            RWOperation::write(a, 1, 10, &buf),
            RWOperation::write(a, 2, 11, &buf),
            RWOperation::write(b, 1, 12, &buf),
        ];
        let buckets = coalesce(ops);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].0, (a, 1));
        assert_eq!(buckets[1].0, (a, 2));
        assert_eq!(buckets[2].0, (b, 1));
    }

    #[test]
    fn test_vectored_write_then_read() {
        let container = open_test_container("cont-pool-vec", "c");
        let a = ObjectId::new(1, 0);
        let b = ObjectId::new(2, 0);

        let p1 = vec![0x11u8; 16];
        let p2 = vec![0x22u8; 24];
        let p3 = vec![0x33u8; 8];
        let writes = vec![
            RWOperation::write(a, 7, 1, &p1),
            RWOperation::write(a, 7, 2, &p2),
            RWOperation::write(b, 9, 1, &p3),
        ];
        assert_eq!(container.write_v(writes).unwrap(), 0);

        let mut r1 = vec![0u8; 16];
        let mut r2 = vec![0u8; 24];
        let mut r3 = vec![0u8; 8];
        let reads = vec![
            RWOperation::read(a, 7, 1, &mut r1),
            RWOperation::read(a, 7, 2, &mut r2),
            RWOperation::read(b, 9, 1, &mut r3),
        ];
        assert_eq!(container.read_v(reads).unwrap(), 0);
        assert_eq!(r1, p1);
        assert_eq!(r2, p2);
        assert_eq!(r3, p3);
    }

    #[test]
    fn test_vectored_empty_batch_is_noop() {
        let container = open_test_container("cont-pool-empty", "c");
        assert_eq!(container.read_v(Vec::new()).unwrap(), 0);
        assert_eq!(container.write_v(Vec::new()).unwrap(), 0);
    }

    #[test]
    fn test_vectored_read_of_missing_key_reports_residual() {
        let container = open_test_container("cont-pool-resid", "c");
        let oid = ObjectId::new(50, 0);
        container.write_single_akey(b"x", oid, 1, 1).unwrap();

        let mut r1 = vec![0u8; 1];
        let mut r2 = vec![0u8; 1];
        let reads = vec![
            RWOperation::read(oid, 1, 1, &mut r1),
            // Different dkey, never written: its bucket fails.
            RWOperation::read(oid, 2, 1, &mut r2),
        ];
        assert_eq!(container.read_v(reads).unwrap(), 1);
    }
}
