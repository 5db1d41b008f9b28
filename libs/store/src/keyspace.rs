//! Keyspace layout: logical identifiers → (object id, dkey, akey).
//!
//! Two layouts coexist. `UniquePerEntity` is the legacy scheme: one object
//! per page, fixed dkey/akey, one hard-coded object per metadata kind.
//! `ClusterDColumn` is the forward-going default: one object per cluster
//! with the column id as dkey and the page offset as akey, all tuple
//! metadata in a single fixed object, page lists in another. A tuple is
//! written with exactly one layout.
//!
//! The mapping is pure; equal inputs must always produce bit-identical
//! keys. The 64-bit constants are part of the on-storage contract and are
//! shared with every other reader of the format.

use tessera_daos::{AttributeKey, DistributionKey, ObjectId};

// ============================================================================
// Constants
// ============================================================================

/// Legacy fixed distribution key for page and metadata objects.
pub const DISTRIBUTION_KEY: DistributionKey = 0x5a3c69f0cafe4a11;

/// Distribution key of the metadata and page-list objects.
pub const DISTRIBUTION_KEY_METADATA: DistributionKey = 0x5a3c69f0cafe4912;

/// Legacy fixed attribute key (equals the anchor attribute key).
pub const ATTRIBUTE_KEY: AttributeKey = 0x4243544b5344422d;

pub const ATTRIBUTE_KEY_ANCHOR: AttributeKey = 0x4243544b5344422d;
pub const ATTRIBUTE_KEY_HEADER: AttributeKey = 0x4243544b5344421e;
pub const ATTRIBUTE_KEY_FOOTER: AttributeKey = 0x4243544b5344420f;

/// Legacy per-kind metadata objects.
pub const OID_ANCHOR: ObjectId = ObjectId::new(u64::MAX, 0);
pub const OID_HEADER: ObjectId = ObjectId::new(u64::MAX - 1, 0);
pub const OID_FOOTER: ObjectId = ObjectId::new(u64::MAX - 2, 0);

/// Fixed object holding anchor, header, and footer.
pub const OID_METADATA: ObjectId = ObjectId::new(u64::MAX - 10, 0);

/// Fixed object holding the serialized page lists, keyed by page offset.
pub const OID_PAGE_LIST: ObjectId = ObjectId::new(u64::MAX - 11, 0);

/// Object class used for all metadata objects.
pub const METADATA_CLASS: &str = "OC_SX";

// ============================================================================
// Mapping
// ============================================================================

/// How logical identifiers are laid out in the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingStrategy {
    /// Legacy: one object per page, hard-coded metadata objects.
    UniquePerEntity,
    /// One object per cluster, dkey = column id, akey = page offset.
    #[default]
    ClusterDColumn,
}

/// Tuple metadata kinds with well-known keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Anchor,
    Header,
    Footer,
}

/// A fully resolved storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectKey {
    pub oid: ObjectId,
    pub dkey: DistributionKey,
    pub akey: AttributeKey,
}

/// Key of the page at `page_offset` (the monotonic offset assigned at
/// commit time) for `column_id` within `cluster_id`.
pub fn page_key(
    strategy: MappingStrategy,
    cluster_id: u64,
    column_id: u64,
    page_offset: u64,
) -> ObjectKey {
    match strategy {
        MappingStrategy::UniquePerEntity => ObjectKey {
            oid: ObjectId::new(page_offset, 0),
            dkey: DISTRIBUTION_KEY,
            akey: ATTRIBUTE_KEY,
        },
        MappingStrategy::ClusterDColumn => ObjectKey {
            oid: ObjectId::new(cluster_id, 0),
            dkey: column_id,
            akey: page_offset,
        },
    }
}

/// Key of a tuple metadata record.
pub fn metadata_key(strategy: MappingStrategy, kind: MetadataKind) -> ObjectKey {
    match strategy {
        MappingStrategy::UniquePerEntity => {
            let oid = match kind {
                MetadataKind::Anchor => OID_ANCHOR,
                MetadataKind::Header => OID_HEADER,
                MetadataKind::Footer => OID_FOOTER,
            };
            ObjectKey {
                oid,
                dkey: DISTRIBUTION_KEY,
                akey: ATTRIBUTE_KEY,
            }
        }
        MappingStrategy::ClusterDColumn => {
            let akey = match kind {
                MetadataKind::Anchor => ATTRIBUTE_KEY_ANCHOR,
                MetadataKind::Header => ATTRIBUTE_KEY_HEADER,
                MetadataKind::Footer => ATTRIBUTE_KEY_FOOTER,
            };
            ObjectKey {
                oid: OID_METADATA,
                dkey: DISTRIBUTION_KEY_METADATA,
                akey,
            }
        }
    }
}

/// Key of the serialized page list committed at `page_offset`.
pub fn page_list_key(page_offset: u64) -> ObjectKey {
    ObjectKey {
        oid: OID_PAGE_LIST,
        dkey: DISTRIBUTION_KEY_METADATA,
        akey: page_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_d_column_page_key() {
        // clusterId=0, columnId=3, offset=0 must land on oid=(0,0), dkey=3, akey=0.
        let key = page_key(MappingStrategy::ClusterDColumn, 0, 3, 0);
        assert_eq!(key.oid, ObjectId::new(0, 0));
        assert_eq!(key.dkey, 3);
        assert_eq!(key.akey, 0);
    }

    #[test]
    fn test_unique_per_entity_page_key() {
        let key = page_key(MappingStrategy::UniquePerEntity, 5, 3, 42);
        assert_eq!(key.oid, ObjectId::new(42, 0));
        assert_eq!(key.dkey, DISTRIBUTION_KEY);
        assert_eq!(key.akey, ATTRIBUTE_KEY);
    }

    #[test]
    fn test_metadata_keys_cluster_d_column() {
        for (kind, akey) in [
            (MetadataKind::Anchor, ATTRIBUTE_KEY_ANCHOR),
            (MetadataKind::Header, ATTRIBUTE_KEY_HEADER),
            (MetadataKind::Footer, ATTRIBUTE_KEY_FOOTER),
        ] {
            let key = metadata_key(MappingStrategy::ClusterDColumn, kind);
            assert_eq!(key.oid, OID_METADATA);
            assert_eq!(key.dkey, DISTRIBUTION_KEY_METADATA);
            assert_eq!(key.akey, akey);
        }
    }

    #[test]
    fn test_metadata_keys_unique_per_entity() {
        for (kind, oid) in [
            (MetadataKind::Anchor, OID_ANCHOR),
            (MetadataKind::Header, OID_HEADER),
            (MetadataKind::Footer, OID_FOOTER),
        ] {
            let key = metadata_key(MappingStrategy::UniquePerEntity, kind);
            assert_eq!(key.oid, oid);
            assert_eq!(key.dkey, DISTRIBUTION_KEY);
            assert_eq!(key.akey, ATTRIBUTE_KEY);
        }
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let a = page_key(MappingStrategy::ClusterDColumn, 7, 2, 19);
        let b = page_key(MappingStrategy::ClusterDColumn, 7, 2, 19);
        assert_eq!(a, b);
    }

    #[test]
    fn test_legacy_anchor_akey_matches_fixed_akey() {
        assert_eq!(ATTRIBUTE_KEY, ATTRIBUTE_KEY_ANCHOR);
    }
}
