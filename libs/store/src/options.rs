//! Write and read options.

use crate::keyspace::MappingStrategy;

/// Options applied when writing a tuple.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Object class applied to page objects. The class actually used is
    /// recorded in the anchor; readers honor that record regardless of
    /// their own configuration.
    pub object_class: String,
    /// Compression level: 0 selects the fast mode, higher values trade
    /// speed for ratio.
    pub compression: u32,
    /// Keyspace layout for new tuples.
    pub strategy: MappingStrategy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            object_class: "OC_SX".to_string(),
            compression: 0,
            strategy: MappingStrategy::default(),
        }
    }
}

impl WriteOptions {
    pub fn with_object_class(object_class: impl Into<String>) -> Self {
        Self {
            object_class: object_class.into(),
            ..Default::default()
        }
    }
}

/// Whether loaded clusters are cached between page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterCache {
    Off,
    #[default]
    On,
}

/// Options applied when reading a tuple.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub cluster_cache: ClusterCache,
    /// Keyspace layout of the tuple being read. Legacy tuples use
    /// [`MappingStrategy::UniquePerEntity`].
    pub strategy: MappingStrategy,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            cluster_cache: ClusterCache::default(),
            strategy: MappingStrategy::default(),
        }
    }
}

impl ReadOptions {
    pub fn without_cluster_cache() -> Self {
        Self {
            cluster_cache: ClusterCache::Off,
            ..Default::default()
        }
    }
}
