//! Low-level object access.
//!
//! Objects are cheap to open and close; callers open one per request and
//! drop it when the request is done.

use crate::container::Container;
use crate::error::{Error, Result};
use crate::raw::{
    self, Handle, ObjectId, OClassId, COND_AKEY_FETCH, COND_DKEY_FETCH, OCH_RDD_DEF, OO_RW,
    OT_AKEY_UINT64, OT_DKEY_UINT64, REC_ANY,
};
use crate::request::FetchUpdateRequest;

// ============================================================================
// ObjClassId
// ============================================================================

/// Object class: the redundancy/sharding template applied to an object when
/// its id is generated.
///
/// [`ObjClassId::UNKNOWN`] means the caller prepared the object id
/// themselves; any other value asks [`Object::open`] to complete the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjClassId(pub OClassId);

impl ObjClassId {
    pub const UNKNOWN: ObjClassId = ObjClassId(raw::OC_UNKNOWN);

    /// Upper bound on a class name's length.
    pub const NAME_MAX_LENGTH: usize = raw::OC_NAME_MAX_LENGTH;

    /// Resolve a class name. Unknown names yield [`ObjClassId::UNKNOWN`].
    pub fn from_name(name: &str) -> Self {
        ObjClassId(raw::oclass_name2id(name))
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == raw::OC_UNKNOWN
    }
}

impl std::fmt::Display for ObjClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(raw::oclass_id2name(self.0).unwrap_or("UNKNOWN"))
    }
}

// ============================================================================
// Object
// ============================================================================

/// An open object inside a container. Closed on drop.
pub struct Object {
    handle: Handle,
}

impl Object {
    /// Open `oid` read-write. When `cid` is not [`ObjClassId::UNKNOWN`] the
    /// id is first completed through the library's id generator with uint64
    /// dkeys/akeys and default redundancy.
    pub fn open(container: &Container, mut oid: ObjectId, cid: ObjClassId) -> Result<Self> {
        if !cid.is_unknown() {
            let rc = raw::obj_generate_oid(
                container.handle(),
                &mut oid,
                OT_DKEY_UINT64 | OT_AKEY_UINT64,
                cid.0,
                OCH_RDD_DEF,
            );
            if rc < 0 {
                return Err(Error::ObjectOpen { oid, code: rc });
            }
        }
        let handle = raw::obj_open(container.handle(), oid, OO_RW)
            .map_err(|code| Error::ObjectOpen { oid, code })?;
        Ok(Self { handle })
    }

    /// Issue a conditional fetch: every record size is reset to the
    /// any-size placeholder (the library reports the actual size back), and
    /// the request fails if the dkey or any akey is absent. Returns the
    /// library status verbatim; with an event attached, the status only
    /// covers the dispatch.
    pub fn fetch(&self, args: &mut FetchUpdateRequest<'_>) -> i32 {
        for iod in args.iods.iter_mut() {
            iod.size = REC_ANY;
        }
        raw::obj_fetch(
            self.handle,
            COND_DKEY_FETCH | COND_AKEY_FETCH,
            args.dkey,
            &mut args.iods,
            &mut args.sgls,
            args.event.as_ref(),
        )
    }

    /// Issue an unconditional update. Returns the library status verbatim.
    pub fn update(&self, args: &mut FetchUpdateRequest<'_>) -> i32 {
        raw::obj_update(
            self.handle,
            0,
            args.dkey,
            &mut args.iods,
            &mut args.sgls,
            args.event.as_ref(),
        )
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        raw::obj_close(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_class_from_name() {
        assert!(!ObjClassId::from_name("OC_SX").is_unknown());
        assert!(ObjClassId::from_name("OC_NOPE").is_unknown());
        assert_eq!(ObjClassId::from_name("OC_SX").to_string(), "OC_SX");
    }

    #[test]
    fn test_unknown_class_displays_as_unknown() {
        assert_eq!(ObjClassId::UNKNOWN.to_string(), "UNKNOWN");
    }
}
