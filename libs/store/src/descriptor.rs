//! Tuple descriptor: the in-memory model of a tuple's schema and storage
//! layout.
//!
//! The writer serializes three kinds of metadata records: the header
//! (schema), one page list per cluster group (page locators), and the
//! footer (cluster-group directory and entry count). On attach the reader
//! decodes all three and merges them back into a [`TupleDescriptor`]
//! through the [`DescriptorBuilder`].
//!
//! Records are MessagePack on the wire and travel through the compression
//! codec; their uncompressed lengths ride in the anchor and the
//! cluster-group directory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type ColumnId = u64;
pub type EntryId = u64;

// ============================================================================
// Schema
// ============================================================================

/// Fixed-width element types a column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Real32,
    Real64,
    /// Raw byte column (element size 1).
    Byte,
}

impl ColumnType {
    pub fn element_size(&self) -> usize {
        match self {
            ColumnType::Int8 | ColumnType::UInt8 | ColumnType::Byte => 1,
            ColumnType::Int16 | ColumnType::UInt16 => 2,
            ColumnType::Int32 | ColumnType::UInt32 | ColumnType::Real32 => 4,
            ColumnType::Int64 | ColumnType::UInt64 | ColumnType::Real64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_id: ColumnId,
    pub name: String,
    pub column_type: ColumnType,
}

/// Serialized by the host on create; the schema half of the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleHeader {
    pub version: u32,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TupleHeader {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| Error::DescriptorEncode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::DescriptorDecode(e.to_string()))
    }
}

// ============================================================================
// Storage layout
// ============================================================================

/// Where a record landed: the monotonic page offset it was committed under
/// and its compressed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageLocator {
    pub position: u64,
    pub bytes_on_storage: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub n_elements: u32,
    pub locator: PageLocator,
}

/// The pages of one column within one cluster, in entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub column_id: ColumnId,
    pub pages: Vec<PageInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub first_entry: EntryId,
    pub n_entries: u64,
    pub page_ranges: BTreeMap<ColumnId, PageRange>,
}

impl ClusterDescriptor {
    pub fn page_range(&self, column_id: ColumnId) -> Option<&PageRange> {
        self.page_ranges.get(&column_id)
    }

    /// Locate the page covering `idx_in_cluster` for `column_id`. Returns
    /// the page number within the range, the cluster-relative index of the
    /// page's first element, and the page info.
    pub fn find_page(
        &self,
        column_id: ColumnId,
        idx_in_cluster: u64,
    ) -> Option<(u64, u64, &PageInfo)> {
        let range = self.page_range(column_id)?;
        let mut first_in_page = 0u64;
        for (page_no, info) in range.pages.iter().enumerate() {
            if idx_in_cluster < first_in_page + info.n_elements as u64 {
                return Some((page_no as u64, first_in_page, info));
            }
            first_in_page += info.n_elements as u64;
        }
        None
    }
}

/// Serialized under the page-list key by `commit_cluster_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageList {
    pub clusters: Vec<ClusterDescriptor>,
}

impl PageList {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| Error::DescriptorEncode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::DescriptorDecode(e.to_string()))
    }
}

/// Directory entry for one cluster group in the footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroupDescriptor {
    pub n_clusters: u64,
    /// Uncompressed size of the group's serialized page list.
    pub page_list_len: u32,
    pub page_list_locator: PageLocator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleFooter {
    pub n_entries: u64,
    pub cluster_groups: Vec<ClusterGroupDescriptor>,
}

impl TupleFooter {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| Error::DescriptorEncode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::DescriptorDecode(e.to_string()))
    }
}

// ============================================================================
// Merged descriptor
// ============================================================================

/// Schema plus the storage layout of every cluster, rebuilt on attach.
/// Cluster ids are indices into the entry-ordered cluster vector, matching
/// the writer's monotonic cluster counter.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDescriptor {
    version: u32,
    name: String,
    columns: Vec<ColumnDescriptor>,
    clusters: Vec<ClusterDescriptor>,
    n_entries: u64,
}

impl TupleDescriptor {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.column_id == column_id)
    }

    pub fn clusters(&self) -> &[ClusterDescriptor] {
        &self.clusters
    }

    pub fn cluster(&self, cluster_id: u64) -> Option<&ClusterDescriptor> {
        self.clusters.get(cluster_id as usize)
    }

    pub fn n_entries(&self) -> u64 {
        self.n_entries
    }

    /// Cluster covering the global `entry`, with its id.
    pub fn cluster_containing(&self, entry: EntryId) -> Option<(u64, &ClusterDescriptor)> {
        let idx = self
            .clusters
            .partition_point(|c| c.first_entry + c.n_entries <= entry);
        let cluster = self.clusters.get(idx)?;
        if entry < cluster.first_entry {
            return None;
        }
        Some((idx as u64, cluster))
    }
}

/// Accumulates header and cluster details during attach.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    header: Option<TupleHeader>,
    clusters: Vec<ClusterDescriptor>,
    n_entries: u64,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&mut self, header: TupleHeader) {
        self.header = Some(header);
    }

    pub fn set_n_entries(&mut self, n_entries: u64) {
        self.n_entries = n_entries;
    }

    pub fn add_cluster(&mut self, cluster: ClusterDescriptor) {
        self.clusters.push(cluster);
    }

    pub fn finalize(self) -> Result<TupleDescriptor> {
        let header = self
            .header
            .ok_or_else(|| Error::DescriptorDecode("no header attached".to_string()))?;
        let mut clusters = self.clusters;
        clusters.sort_by_key(|c| c.first_entry);
        Ok(TupleDescriptor {
            version: header.version,
            name: header.name,
            columns: header.columns,
            clusters,
            n_entries: self.n_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cluster(first_entry: u64, pages: &[(u32, u64, u64)]) -> ClusterDescriptor {
        let infos: Vec<PageInfo> = pages
            .iter()
            .map(|&(n, position, size)| PageInfo {
                n_elements: n,
                locator: PageLocator {
                    position,
                    bytes_on_storage: size,
                },
            })
            .collect();
        let n_entries = infos.iter().map(|p| p.n_elements as u64).sum();
        let mut page_ranges = BTreeMap::new();
        page_ranges.insert(
            0,
            PageRange {
                column_id: 0,
                pages: infos,
            },
        );
        ClusterDescriptor {
            first_entry,
            n_entries,
            page_ranges,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = TupleHeader {
            version: 1,
            name: "hits".to_string(),
            columns: vec![ColumnDescriptor {
                column_id: 0,
                name: "energy".to_string(),
                column_type: ColumnType::Real64,
            }],
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(TupleHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_find_page_walks_element_counts() {
        let cluster = test_cluster(0, &[(10, 0, 100), (20, 1, 200), (5, 2, 50)]);
        let (page_no, first, info) = cluster.find_page(0, 0).unwrap();
        assert_eq!((page_no, first, info.n_elements), (0, 0, 10));
        let (page_no, first, info) = cluster.find_page(0, 10).unwrap();
        assert_eq!((page_no, first, info.n_elements), (1, 10, 20));
        let (page_no, first, _) = cluster.find_page(0, 34).unwrap();
        assert_eq!((page_no, first), (2, 30));
        assert!(cluster.find_page(0, 35).is_none());
        assert!(cluster.find_page(1, 0).is_none());
    }

    #[test]
    fn test_cluster_containing_across_clusters() {
        let mut builder = DescriptorBuilder::new();
        builder.set_header(TupleHeader {
            version: 1,
            name: "t".to_string(),
            columns: vec![],
        });
        builder.add_cluster(test_cluster(0, &[(10, 0, 1)]));
        builder.add_cluster(test_cluster(10, &[(30, 1, 1)]));
        builder.set_n_entries(40);
        let desc = builder.finalize().unwrap();

        assert_eq!(desc.cluster_containing(0).unwrap().0, 0);
        assert_eq!(desc.cluster_containing(9).unwrap().0, 0);
        assert_eq!(desc.cluster_containing(10).unwrap().0, 1);
        assert_eq!(desc.cluster_containing(39).unwrap().0, 1);
        assert!(desc.cluster_containing(40).is_none());
    }

    #[test]
    fn test_builder_sorts_clusters_by_first_entry() {
        let mut builder = DescriptorBuilder::new();
        builder.set_header(TupleHeader {
            version: 1,
            name: "t".to_string(),
            columns: vec![],
        });
        builder.add_cluster(test_cluster(10, &[(30, 1, 1)]));
        builder.add_cluster(test_cluster(0, &[(10, 0, 1)]));
        let desc = builder.finalize().unwrap();
        assert_eq!(desc.clusters()[0].first_entry, 0);
        assert_eq!(desc.clusters()[1].first_entry, 10);
    }

    #[test]
    fn test_finalize_without_header_fails() {
        assert!(DescriptorBuilder::new().finalize().is_err());
    }

    #[test]
    fn test_page_list_roundtrip() {
        let list = PageList {
            clusters: vec![test_cluster(0, &[(10, 0, 128)])],
        };
        let bytes = list.to_bytes().unwrap();
        assert_eq!(PageList::from_bytes(&bytes).unwrap(), list);
    }
}
