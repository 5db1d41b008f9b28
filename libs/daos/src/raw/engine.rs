//! In-process object store engine.
//!
//! Serves the library calls in [`super`] from process-local state: a
//! registry of pools holding labeled containers, each container holding
//! objects, each object a map of `(dkey, akey) → record`. Completion of
//! event-attached requests happens synchronously inside the call, but is
//! only observable through the event accounting; callers must poll, the
//! same as against the cluster-backed library.
//!
//! Pools are provisioned on first connect; pool administration is not part
//! of this client.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::event::{Event, EventState};
use super::{
    AttributeKey, DistributionKey, Handle, IoDescriptor, ObjectId, OClassId, SgBuffer, SgList,
    COND_AKEY_FETCH, COND_DKEY_FETCH, DER_BUSY, DER_EXIST, DER_INVAL, DER_NONEXIST, DER_NO_HDL,
    DER_REC2BIG, REC_ANY,
};

// ============================================================================
// State
// ============================================================================

pub(crate) struct Engine {
    handles: DashMap<u64, HandleTarget>,
    next_handle: AtomicU64,
    pools: DashMap<String, Arc<PoolEntry>>,
}

enum HandleTarget {
    Pool(Arc<PoolEntry>),
    Container(Arc<ContainerEntry>),
    Object(Arc<ObjectStore>),
    Queue(Arc<QueueEntry>),
}

struct PoolEntry {
    containers: DashMap<String, Arc<ContainerEntry>>,
}

struct ContainerEntry {
    objects: DashMap<ObjectId, Arc<ObjectStore>>,
}

struct ObjectStore {
    records: DashMap<(DistributionKey, AttributeKey), Vec<u8>>,
}

struct QueueEntry {
    live_events: AtomicU32,
}

static ENGINE: OnceLock<Engine> = OnceLock::new();

pub(crate) fn engine() -> &'static Engine {
    ENGINE.get_or_init(|| Engine {
        handles: DashMap::new(),
        next_handle: AtomicU64::new(1),
        pools: DashMap::new(),
    })
}

pub(crate) fn init() {
    let _ = engine();
}

// ============================================================================
// Implementation
// ============================================================================

impl Engine {
    fn alloc_handle(&self, target: HandleTarget) -> Handle {
        let cookie = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.handles.insert(cookie, target);
        Handle(cookie)
    }

    fn pool(&self, h: Handle) -> Option<Arc<PoolEntry>> {
        match self.handles.get(&h.0).as_deref() {
            Some(HandleTarget::Pool(p)) => Some(p.clone()),
            _ => None,
        }
    }

    fn container(&self, h: Handle) -> Option<Arc<ContainerEntry>> {
        match self.handles.get(&h.0).as_deref() {
            Some(HandleTarget::Container(c)) => Some(c.clone()),
            _ => None,
        }
    }

    fn object(&self, h: Handle) -> Option<Arc<ObjectStore>> {
        match self.handles.get(&h.0).as_deref() {
            Some(HandleTarget::Object(o)) => Some(o.clone()),
            _ => None,
        }
    }

    fn queue(&self, cookie: u64) -> Option<Arc<QueueEntry>> {
        match self.handles.get(&cookie).as_deref() {
            Some(HandleTarget::Queue(q)) => Some(q.clone()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Pools and containers
    // ------------------------------------------------------------------

    pub(crate) fn pool_connect(&self, label: &str, _flags: u32) -> Result<Handle, i32> {
        if label.is_empty() {
            return Err(DER_INVAL);
        }
        let entry = self
            .pools
            .entry(label.to_string())
            .or_insert_with(|| {
                Arc::new(PoolEntry {
                    containers: DashMap::new(),
                })
            })
            .clone();
        Ok(self.alloc_handle(HandleTarget::Pool(entry)))
    }

    pub(crate) fn pool_disconnect(&self, poh: Handle) -> i32 {
        match self.handles.remove(&poh.0) {
            Some((_, HandleTarget::Pool(_))) => 0,
            _ => DER_NO_HDL,
        }
    }

    pub(crate) fn cont_create_with_label(&self, poh: Handle, label: &str) -> i32 {
        let Some(pool) = self.pool(poh) else {
            return DER_NO_HDL;
        };
        if pool.containers.contains_key(label) {
            return DER_EXIST;
        }
        pool.containers.insert(
            label.to_string(),
            Arc::new(ContainerEntry {
                objects: DashMap::new(),
            }),
        );
        0
    }

    pub(crate) fn cont_open(&self, poh: Handle, label: &str, _flags: u32) -> Result<Handle, i32> {
        let pool = self.pool(poh).ok_or(DER_NO_HDL)?;
        let cont = pool.containers.get(label).ok_or(DER_NONEXIST)?.clone();
        Ok(self.alloc_handle(HandleTarget::Container(cont)))
    }

    pub(crate) fn cont_close(&self, coh: Handle) -> i32 {
        match self.handles.remove(&coh.0) {
            Some((_, HandleTarget::Container(_))) => 0,
            _ => DER_NO_HDL,
        }
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    pub(crate) fn obj_generate_oid(
        &self,
        coh: Handle,
        oid: &mut ObjectId,
        otype: u32,
        cid: OClassId,
        _hints: u32,
    ) -> i32 {
        if self.container(coh).is_none() {
            return DER_NO_HDL;
        }
        // Reserved layout: version nibble, type byte, class id. The low
        // 36 bits of `hi` stay caller-owned.
        let reserved = (1u64 << 60) | ((otype as u64 & 0xff) << 52) | ((cid as u64) << 36);
        oid.hi = (oid.hi & 0x0000_000f_ffff_ffff) | reserved;
        0
    }

    pub(crate) fn obj_open(&self, coh: Handle, oid: ObjectId, _mode: u32) -> Result<Handle, i32> {
        let cont = self.container(coh).ok_or(DER_NO_HDL)?;
        let store = cont
            .objects
            .entry(oid)
            .or_insert_with(|| {
                Arc::new(ObjectStore {
                    records: DashMap::new(),
                })
            })
            .clone();
        Ok(self.alloc_handle(HandleTarget::Object(store)))
    }

    pub(crate) fn obj_close(&self, oh: Handle) -> i32 {
        match self.handles.remove(&oh.0) {
            Some((_, HandleTarget::Object(_))) => 0,
            _ => DER_NO_HDL,
        }
    }

    pub(crate) fn obj_fetch(
        &self,
        oh: Handle,
        flags: u64,
        dkey: DistributionKey,
        iods: &mut [IoDescriptor],
        sgls: &mut [SgList<'_>],
    ) -> i32 {
        let Some(store) = self.object(oh) else {
            return DER_NO_HDL;
        };
        if iods.len() != sgls.len() {
            return DER_INVAL;
        }
        let conditional = flags & (COND_DKEY_FETCH | COND_AKEY_FETCH) != 0;
        for (iod, sgl) in iods.iter_mut().zip(sgls.iter_mut()) {
            let Some(record) = store.records.get(&(dkey, iod.akey)) else {
                if conditional {
                    return DER_NONEXIST;
                }
                iod.size = REC_ANY;
                continue;
            };
            if record.len() > sgl.total_len() {
                return DER_REC2BIG;
            }
            let mut remaining: &[u8] = &record;
            let mut used = 0u32;
            for iov in sgl.iovs.iter_mut() {
                if remaining.is_empty() {
                    break;
                }
                let SgBuffer::Fetch(dest) = iov else {
                    return DER_INVAL;
                };
                let n = remaining.len().min(dest.len());
                dest[..n].copy_from_slice(&remaining[..n]);
                remaining = &remaining[n..];
                used += 1;
            }
            sgl.nr_out = used;
            iod.size = record.len() as u64;
        }
        0
    }

    pub(crate) fn obj_update(
        &self,
        oh: Handle,
        _flags: u64,
        dkey: DistributionKey,
        iods: &mut [IoDescriptor],
        sgls: &mut [SgList<'_>],
    ) -> i32 {
        let Some(store) = self.object(oh) else {
            return DER_NO_HDL;
        };
        if iods.len() != sgls.len() {
            return DER_INVAL;
        }
        for (iod, sgl) in iods.iter_mut().zip(sgls.iter()) {
            let mut record = Vec::with_capacity(sgl.total_len());
            for iov in &sgl.iovs {
                match iov {
                    SgBuffer::Update(src) => record.extend_from_slice(src),
                    SgBuffer::Fetch(_) => return DER_INVAL,
                }
            }
            iod.size = record.len() as u64;
            store.records.insert((dkey, iod.akey), record);
        }
        0
    }

    // ------------------------------------------------------------------
    // Event queues
    // ------------------------------------------------------------------

    pub(crate) fn eq_create(&self) -> Result<Handle, i32> {
        let entry = Arc::new(QueueEntry {
            live_events: AtomicU32::new(0),
        });
        Ok(self.alloc_handle(HandleTarget::Queue(entry)))
    }

    pub(crate) fn eq_destroy(&self, eqh: Handle, _flags: i32) -> i32 {
        let Some(queue) = self.queue(eqh.0) else {
            return DER_NO_HDL;
        };
        if queue.live_events.load(Ordering::Acquire) != 0 {
            return DER_BUSY;
        }
        self.handles.remove(&eqh.0);
        0
    }

    pub(crate) fn event_init(&self, eqh: Handle, parent: Option<&Event>) -> Result<Event, i32> {
        let queue = self.queue(eqh.0).ok_or(DER_NO_HDL)?;
        if let Some(parent) = parent {
            let rc = parent.state.attach_child();
            if rc < 0 {
                return Err(rc);
            }
        }
        queue.live_events.fetch_add(1, Ordering::AcqRel);
        Ok(Event {
            state: EventState::new(eqh.0, parent.map(|p| p.state.clone())),
        })
    }

    pub(crate) fn event_fini(&self, ev: &Event) -> i32 {
        let rc = ev.state.finalize();
        if rc == 0 {
            if let Some(queue) = self.queue(ev.state.queue) {
                queue.live_events.fetch_sub(1, Ordering::AcqRel);
            }
        }
        rc
    }
}
