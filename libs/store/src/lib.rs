//! Columnar page storage on a DAOS-style object store.
//!
//! A tuple (a page-structured columnar dataset) is laid out across the
//! store's three-level keyspace (object id → dkey → akey). Pages carry the
//! column data; a compressed header, footer, and per-cluster-group page
//! lists carry the metadata; a small fixed-format anchor, written last,
//! locates everything else.
//!
//! # Architecture
//!
//! ```text
//!      write path                          read path
//! ┌───────────────────┐             ┌─────────────────────┐
//! │     PageSink      │             │     PageSource      │
//! │ commit_page /     │             │ attach /            │
//! │ commit_cluster /  │             │ populate_page /     │
//! │ commit_dataset    │             │ load_clusters       │
//! └─────────┬─────────┘             └──────────┬──────────┘
//!           │        keyspace map (pure)       │
//!           └───────────────┬──────────────────┘
//!                           ▼
//!                 tessera_daos::Container
//!            single-akey I/O + vectored batches
//! ```
//!
//! Cluster reads are batched: every page of a requested cluster becomes one
//! read operation, and the container coalesces them per (object, dkey),
//! one request per column under the cluster-per-object layout.

mod anchor;
mod cluster;
mod codec;
mod descriptor;
mod error;
mod keyspace;
mod options;
mod pages;
mod sink;
mod source;
mod uri;

#[cfg(test)]
mod e2e_tests;

pub use anchor::TupleAnchor;
pub use cluster::{Cluster, ClusterKey, ClusterPool, OnDiskPageMap, PagePool, PopulatedPage};
pub use codec::Compressor;
pub use descriptor::{
    ClusterDescriptor, ClusterGroupDescriptor, ColumnDescriptor, ColumnId, ColumnType,
    DescriptorBuilder, EntryId, PageInfo, PageList, PageLocator, PageRange, TupleDescriptor,
    TupleFooter, TupleHeader,
};
pub use error::{Error, Result};
pub use keyspace::{metadata_key, page_key, page_list_key, MappingStrategy, MetadataKind, ObjectKey};
pub use options::{ClusterCache, ReadOptions, WriteOptions};
pub use pages::{seal_page, unseal_page, Page, SealedPage};
pub use sink::{PageSink, SinkState};
pub use source::{PageSource, SealedPageMeta};
pub use uri::StorageUri;
