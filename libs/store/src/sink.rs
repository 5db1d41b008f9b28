//! Page sink: the write half of tuple storage.
//!
//! The host drives the sink through a fixed lifecycle:
//!
//! ```text
//! Init ──create──► Created ──commit_page──► ClusterOpen ─┐
//!                     │                         ▲  │     commit_cluster
//!                     │                         └──┘          │
//!                     │                                       ▼
//!                     │                              ClusterCommitted
//!                     │                                       │
//!                     │                              commit_cluster_group
//!                     │                                       ▼
//!                     │                            ClusterGroupCommitted
//!                     └──────────commit_dataset───────────────┤
//!                                                             ▼
//!                                                     DatasetCommitted
//! ```
//!
//! Every write is an independent single-key operation; there are no
//! multi-key transactions. The anchor goes out last, so a reader that finds
//! no valid anchor treats the tuple as absent. Page offsets come from one
//! monotonic counter shared with page-list commits, which is why locator
//! positions are strictly increasing with occasional gaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tessera_daos::{Container, ObjClassId, Pool};

use crate::anchor::TupleAnchor;
use crate::codec::Compressor;
use crate::descriptor::{ColumnId, PageLocator};
use crate::error::{Error, Result};
use crate::keyspace::{self, MetadataKind};
use crate::options::WriteOptions;
use crate::pages::{seal_page, Page, SealedPage};
use crate::uri::StorageUri;

/// Lifecycle position of a [`PageSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Init,
    Created,
    ClusterOpen,
    ClusterCommitted,
    ClusterGroupCommitted,
    DatasetCommitted,
}

pub struct PageSink {
    uri: StorageUri,
    options: WriteOptions,
    compressor: Compressor,
    anchor: TupleAnchor,
    container: Option<Container>,
    state: SinkState,
    /// Monotonic offset for pages and page lists.
    page_offset: AtomicU64,
    current_cluster: u64,
    bytes_current_cluster: u64,
}

impl PageSink {
    pub fn new(uri: &str, options: WriteOptions) -> Result<Self> {
        let uri = StorageUri::parse(uri)?;
        let compressor = Compressor::new(options.compression);
        Ok(Self {
            uri,
            options,
            compressor,
            anchor: TupleAnchor::default(),
            container: None,
            state: SinkState::Init,
            page_offset: AtomicU64::new(0),
            current_cluster: 0,
            bytes_current_cluster: 0,
        })
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    fn expect_state(&self, operation: &'static str, allowed: &[SinkState]) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(Error::IllegalState {
            operation,
            state: self.state,
        })
    }

    fn container(&self) -> &Container {
        self.container
            .as_ref()
            .expect("container is open in every post-create state")
    }

    /// Open the tuple on storage and write its compressed header.
    ///
    /// Validates the configured object class, connects the pool, opens the
    /// container (creating it if absent), and records the header sizes in
    /// the anchor.
    pub fn create(&mut self, serialized_header: &[u8]) -> Result<()> {
        self.expect_state("create", &[SinkState::Init])?;

        let class = ObjClassId::from_name(&self.options.object_class);
        if class.is_unknown() {
            return Err(Error::UnknownObjectClass(self.options.object_class.clone()));
        }
        self.anchor.obj_class = self.options.object_class.clone();

        let pool = Pool::connect(&self.uri.pool)?;
        let mut container = Container::open(Arc::clone(&pool), &self.uri.container, true)?;
        container.set_default_object_class(class);

        let zipped = self.compressor.compress(serialized_header)?;
        let key = keyspace::metadata_key(self.options.strategy, MetadataKind::Header);
        container.write_single_akey_with_class(
            &zipped,
            key.oid,
            key.dkey,
            key.akey,
            ObjClassId::from_name(keyspace::METADATA_CLASS),
        )?;
        self.anchor.n_bytes_header = zipped.len() as u32;
        self.anchor.len_header = serialized_header.len() as u32;

        tracing::debug!(
            pool = %self.uri.pool,
            container = %self.uri.container,
            object_class = %self.options.object_class,
            n_bytes_header = zipped.len(),
            "tuple created"
        );
        self.container = Some(container);
        self.state = SinkState::Created;
        Ok(())
    }

    /// Seal (compress and frame) a page, then commit it.
    pub fn commit_page(&mut self, page: &Page) -> Result<PageLocator> {
        let sealed = seal_page(page, &self.compressor)?;
        self.commit_sealed_page(page.column_id(), &sealed)
    }

    /// Write an already sealed page under the next monotonic offset and
    /// return its locator.
    pub fn commit_sealed_page(
        &mut self,
        column_id: ColumnId,
        sealed: &SealedPage,
    ) -> Result<PageLocator> {
        self.expect_state(
            "commit_sealed_page",
            &[
                SinkState::Created,
                SinkState::ClusterOpen,
                SinkState::ClusterCommitted,
                SinkState::ClusterGroupCommitted,
            ],
        )?;

        let offset = self.page_offset.fetch_add(1, Ordering::Relaxed);
        let key = keyspace::page_key(
            self.options.strategy,
            self.current_cluster,
            column_id,
            offset,
        );
        self.container()
            .write_single_akey(&sealed.buf, key.oid, key.dkey, key.akey)?;

        self.bytes_current_cluster += sealed.size() as u64;
        self.state = SinkState::ClusterOpen;
        tracing::trace!(
            column_id,
            cluster_id = self.current_cluster,
            offset,
            bytes = sealed.size(),
            "page committed"
        );
        Ok(PageLocator {
            position: offset,
            bytes_on_storage: sealed.size() as u64,
        })
    }

    /// Close the open cluster: return the bytes written into it and advance
    /// the cluster counter.
    pub fn commit_cluster(&mut self, n_entries: u64) -> Result<u64> {
        self.expect_state("commit_cluster", &[SinkState::ClusterOpen])?;
        self.state = SinkState::ClusterCommitted;
        self.current_cluster += 1;
        tracing::trace!(
            cluster_id = self.current_cluster - 1,
            n_entries,
            bytes = self.bytes_current_cluster,
            "cluster committed"
        );
        Ok(std::mem::take(&mut self.bytes_current_cluster))
    }

    /// Compress and write a serialized page list under the next monotonic
    /// offset; returns where it landed.
    pub fn commit_cluster_group(&mut self, serialized_page_list: &[u8]) -> Result<PageLocator> {
        self.expect_state("commit_cluster_group", &[SinkState::ClusterCommitted])?;

        let zipped = self.compressor.compress(serialized_page_list)?;
        let offset = self.page_offset.fetch_add(1, Ordering::Relaxed);
        let key = keyspace::page_list_key(offset);
        self.container().write_single_akey_with_class(
            &zipped,
            key.oid,
            key.dkey,
            key.akey,
            ObjClassId::from_name(keyspace::METADATA_CLASS),
        )?;

        self.state = SinkState::ClusterGroupCommitted;
        tracing::trace!(offset, bytes = zipped.len(), "cluster group committed");
        Ok(PageLocator {
            position: offset,
            bytes_on_storage: zipped.len() as u64,
        })
    }

    /// Write the compressed footer, then the anchor. Terminal.
    pub fn commit_dataset(&mut self, serialized_footer: &[u8]) -> Result<()> {
        self.expect_state(
            "commit_dataset",
            &[SinkState::Created, SinkState::ClusterGroupCommitted],
        )?;

        let metadata_class = ObjClassId::from_name(keyspace::METADATA_CLASS);
        let zipped = self.compressor.compress(serialized_footer)?;
        let key = keyspace::metadata_key(self.options.strategy, MetadataKind::Footer);
        self.container().write_single_akey_with_class(
            &zipped,
            key.oid,
            key.dkey,
            key.akey,
            metadata_class,
        )?;
        self.anchor.n_bytes_footer = zipped.len() as u32;
        self.anchor.len_footer = serialized_footer.len() as u32;

        let key = keyspace::metadata_key(self.options.strategy, MetadataKind::Anchor);
        self.container().write_single_akey_with_class(
            &self.anchor.serialize(),
            key.oid,
            key.dkey,
            key.akey,
            metadata_class,
        )?;

        self.state = SinkState::DatasetCommitted;
        tracing::debug!(
            container = %self.uri.container,
            n_bytes_footer = zipped.len(),
            "dataset committed"
        );
        Ok(())
    }
}
