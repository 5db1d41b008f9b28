//! Page source: the read half of tuple storage.
//!
//! Attaching reads the anchor, header, footer, and every page list, and
//! rebuilds the tuple descriptor. Page requests then either read a single
//! key synchronously (cluster cache off) or batch-load a whole cluster:
//! every page of the requested columns becomes one read operation against
//! one contiguous payload buffer, and the container coalesces the batch
//! per (object, dkey), one request per column under the cluster-per-object
//! layout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tessera_daos::{Container, ObjClassId, Pool, RWOperation};

use crate::anchor::TupleAnchor;
use crate::cluster::{Cluster, ClusterKey, ClusterPool, OnDiskPageMap, PagePool, PopulatedPage};
use crate::codec::decompress;
use crate::descriptor::{
    ColumnId, DescriptorBuilder, EntryId, PageList, TupleDescriptor, TupleFooter, TupleHeader,
};
use crate::error::{Error, Result};
use crate::keyspace::{self, MetadataKind, ObjectKey};
use crate::options::{ClusterCache, ReadOptions};
use crate::pages::unseal_page;
use crate::uri::StorageUri;

/// How many loaded clusters stay cached.
const CLUSTER_POOL_CAPACITY: usize = 4;

/// Shape of a sealed page as recorded in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealedPageMeta {
    pub bytes_on_storage: u64,
    pub n_elements: u32,
}

pub struct PageSource {
    uri: StorageUri,
    options: ReadOptions,
    container: Container,
    descriptor: Option<TupleDescriptor>,
    page_pool: PagePool,
    cluster_pool: ClusterPool,
    current_cluster: Option<Arc<Cluster>>,
}

impl PageSource {
    /// Connect to the tuple's pool and open its container. The tuple itself
    /// is not touched until [`PageSource::attach`].
    pub fn new(uri: &str, options: ReadOptions) -> Result<Self> {
        let uri = StorageUri::parse(uri)?;
        let pool = Pool::connect(&uri.pool)?;
        let container = Container::open(pool, &uri.container, false)?;
        Ok(Self {
            uri,
            options,
            container,
            descriptor: None,
            page_pool: PagePool::new(),
            cluster_pool: ClusterPool::new(CLUSTER_POOL_CAPACITY),
            current_cluster: None,
        })
    }

    pub fn descriptor(&self) -> Result<&TupleDescriptor> {
        self.descriptor.as_ref().ok_or(Error::NotAttached)
    }

    /// Object class the tuple was written with (valid after attach).
    pub fn object_class(&self) -> String {
        self.container.default_object_class().to_string()
    }

    fn metadata_class(&self) -> ObjClassId {
        ObjClassId::from_name(keyspace::METADATA_CLASS)
    }

    /// Read and decompress one metadata record whose compressed and
    /// uncompressed sizes are known from the anchor or footer.
    fn read_metadata_record(&self, key: ObjectKey, n_bytes: usize, len: usize) -> Result<Vec<u8>> {
        let mut zipped = vec![0u8; n_bytes];
        let n = self.container.read_single_akey_with_class(
            &mut zipped,
            key.oid,
            key.dkey,
            key.akey,
            self.metadata_class(),
        )?;
        decompress(&zipped[..n], len)
    }

    /// Rebuild the tuple descriptor from storage.
    ///
    /// Reads the fixed-size anchor envelope, validates the recorded object
    /// class, then reads header and footer through their anchor sizes, and
    /// finally merges every cluster group's page list into the descriptor.
    pub fn attach(&mut self) -> Result<&TupleDescriptor> {
        let strategy = self.options.strategy;

        let mut buf = vec![0u8; TupleAnchor::reserved_size()];
        let key = keyspace::metadata_key(strategy, MetadataKind::Anchor);
        let n = self.container.read_single_akey_with_class(
            &mut buf,
            key.oid,
            key.dkey,
            key.akey,
            self.metadata_class(),
        )?;
        let (anchor, _) = TupleAnchor::deserialize(&buf[..n])?;

        let class = ObjClassId::from_name(&anchor.obj_class);
        if class.is_unknown() {
            return Err(Error::UnknownObjectClass(anchor.obj_class));
        }
        self.container.set_default_object_class(class);

        let header_bytes = self.read_metadata_record(
            keyspace::metadata_key(strategy, MetadataKind::Header),
            anchor.n_bytes_header as usize,
            anchor.len_header as usize,
        )?;
        let header = TupleHeader::from_bytes(&header_bytes)?;

        let footer_bytes = self.read_metadata_record(
            keyspace::metadata_key(strategy, MetadataKind::Footer),
            anchor.n_bytes_footer as usize,
            anchor.len_footer as usize,
        )?;
        let footer = TupleFooter::from_bytes(&footer_bytes)?;

        let mut builder = DescriptorBuilder::new();
        builder.set_header(header);
        builder.set_n_entries(footer.n_entries);
        for group in &footer.cluster_groups {
            let bytes = self.read_metadata_record(
                keyspace::page_list_key(group.page_list_locator.position),
                group.page_list_locator.bytes_on_storage as usize,
                group.page_list_len as usize,
            )?;
            let page_list = PageList::from_bytes(&bytes)?;
            for cluster in page_list.clusters {
                builder.add_cluster(cluster);
            }
        }

        let descriptor = builder.finalize()?;
        tracing::info!(
            tuple = %descriptor.name(),
            container = %self.uri.container,
            n_clusters = descriptor.clusters().len(),
            n_entries = descriptor.n_entries(),
            "tuple attached"
        );
        self.descriptor = Some(descriptor);
        self.descriptor()
    }

    /// Look up a sealed page's shape and, when `buf` is given, read its
    /// bytes into it with one synchronous fetch.
    pub fn load_sealed_page(
        &self,
        column_id: ColumnId,
        cluster_id: u64,
        idx_in_cluster: u64,
        buf: Option<&mut [u8]>,
    ) -> Result<SealedPageMeta> {
        let desc = self.descriptor()?;
        let cluster = desc
            .cluster(cluster_id)
            .ok_or(Error::ClusterNotFound(cluster_id))?;
        let (_, _, info) = cluster
            .find_page(column_id, idx_in_cluster)
            .ok_or(Error::EntryOutOfRange {
                column_id,
                entry: idx_in_cluster,
            })?;
        let meta = SealedPageMeta {
            bytes_on_storage: info.locator.bytes_on_storage,
            n_elements: info.n_elements,
        };
        if let Some(buf) = buf {
            let key = keyspace::page_key(
                self.options.strategy,
                cluster_id,
                column_id,
                info.locator.position,
            );
            self.container.read_single_akey(
                &mut buf[..meta.bytes_on_storage as usize],
                key.oid,
                key.dkey,
                key.akey,
            )?;
        }
        Ok(meta)
    }

    /// Produce the unsealed page covering `global_index` of `column_id`,
    /// registering it in the page pool.
    ///
    /// With the cluster cache off the page is fetched with one direct read;
    /// otherwise the whole cluster is batch-loaded (or taken from the
    /// cluster pool) and the page resolved inside it.
    pub fn populate_page(
        &mut self,
        column_id: ColumnId,
        global_index: EntryId,
    ) -> Result<Arc<PopulatedPage>> {
        if let Some(page) = self.page_pool.get(column_id, global_index) {
            return Ok(page);
        }

        let (cluster_id, first_entry, page_no, first_in_page, n_elements, locator, column_type, columns) = {
            let desc = self.descriptor()?;
            let (cluster_id, cluster) =
                desc.cluster_containing(global_index)
                    .ok_or(Error::EntryOutOfRange {
                        column_id,
                        entry: global_index,
                    })?;
            let idx_in_cluster = global_index - cluster.first_entry;
            let (page_no, first_in_page, info) = cluster
                .find_page(column_id, idx_in_cluster)
                .ok_or(Error::EntryOutOfRange {
                    column_id,
                    entry: global_index,
                })?;
            let column_type = desc
                .column(column_id)
                .ok_or(Error::ColumnNotFound(column_id))?
                .column_type;
            let columns: Vec<ColumnId> = desc.columns().iter().map(|c| c.column_id).collect();
            (
                cluster_id,
                cluster.first_entry,
                page_no,
                first_in_page,
                info.n_elements,
                info.locator,
                column_type,
                columns,
            )
        };

        let data = match self.options.cluster_cache {
            ClusterCache::Off => {
                let mut zipped = vec![0u8; locator.bytes_on_storage as usize];
                let key = keyspace::page_key(
                    self.options.strategy,
                    cluster_id,
                    column_id,
                    locator.position,
                );
                self.container
                    .read_single_akey(&mut zipped, key.oid, key.dkey, key.akey)?;
                unseal_page(&zipped, n_elements, column_type)?
            }
            ClusterCache::On => {
                let cluster = self.cluster_for(cluster_id, &columns, column_id)?;
                let sealed =
                    cluster
                        .on_disk_page(column_id, page_no)
                        .ok_or(Error::PageNotFound {
                            column_id,
                            cluster_id,
                            page_no,
                        })?;
                unseal_page(sealed, n_elements, column_type)?
            }
        };

        let page = Arc::new(PopulatedPage {
            column_id,
            column_type,
            cluster_id,
            first_global: first_entry + first_in_page,
            n_elements,
            buf: data,
        });
        self.page_pool.register(Arc::clone(&page));
        Ok(page)
    }

    /// The cluster holding `column_id`'s pages, from the current slot, the
    /// cluster pool, or a fresh batch load.
    fn cluster_for(
        &mut self,
        cluster_id: u64,
        columns: &[ColumnId],
        column_id: ColumnId,
    ) -> Result<Arc<Cluster>> {
        if let Some(cluster) = &self.current_cluster {
            if cluster.id() == cluster_id && cluster.contains_column(column_id) {
                return Ok(Arc::clone(cluster));
            }
        }
        if let Some(cluster) = self.cluster_pool.get(cluster_id) {
            if cluster.contains_column(column_id) {
                self.current_cluster = Some(Arc::clone(&cluster));
                return Ok(cluster);
            }
        }
        let mut loaded = self.load_clusters(&[ClusterKey {
            cluster_id,
            columns: columns.to_vec(),
        }])?;
        let cluster = Arc::new(loaded.remove(0));
        self.cluster_pool.put(Arc::clone(&cluster));
        self.current_cluster = Some(Arc::clone(&cluster));
        Ok(cluster)
    }

    /// Batch-load clusters.
    ///
    /// For each key, every page of the requested columns is enumerated in
    /// column order with monotonically increasing buffer positions, one
    /// contiguous payload buffer is allocated for the total, and the pages
    /// become one vectored read. A non-zero residual aborts the load.
    pub fn load_clusters(&self, keys: &[ClusterKey]) -> Result<Vec<Cluster>> {
        let desc = self.descriptor()?;
        let mut result = Vec::with_capacity(keys.len());

        struct Extent {
            column_id: ColumnId,
            page_no: u64,
            position: u64,
            size: usize,
        }

        for key in keys {
            let cluster_desc = desc
                .cluster(key.cluster_id)
                .ok_or(Error::ClusterNotFound(key.cluster_id))?;

            let mut extents = Vec::new();
            let mut sz_payload = 0usize;
            for &column_id in &key.columns {
                let Some(range) = cluster_desc.page_range(column_id) else {
                    continue;
                };
                for (page_no, info) in range.pages.iter().enumerate() {
                    extents.push(Extent {
                        column_id,
                        page_no: page_no as u64,
                        position: info.locator.position,
                        size: info.locator.bytes_on_storage as usize,
                    });
                    sz_payload += info.locator.bytes_on_storage as usize;
                }
            }

            let mut payload = vec![0u8; sz_payload];
            let mut ops = Vec::with_capacity(extents.len());
            let mut rest: &mut [u8] = &mut payload;
            for ext in &extents {
                let (slice, tail) = std::mem::take(&mut rest).split_at_mut(ext.size);
                let page_key = keyspace::page_key(
                    self.options.strategy,
                    key.cluster_id,
                    ext.column_id,
                    ext.position,
                );
                ops.push(RWOperation::read(
                    page_key.oid,
                    page_key.dkey,
                    page_key.akey,
                    slice,
                ));
                rest = tail;
            }

            let residual = self.container.read_v(ops)?;
            if residual != 0 {
                return Err(Error::VectoredReadIncomplete { residual });
            }

            let mut index = HashMap::new();
            let mut offset = 0usize;
            for ext in &extents {
                index.insert((ext.column_id, ext.page_no), (offset, ext.size));
                offset += ext.size;
            }
            tracing::debug!(
                cluster_id = key.cluster_id,
                n_pages = extents.len(),
                sz_payload,
                "cluster loaded"
            );
            let columns: HashSet<ColumnId> = key.columns.iter().copied().collect();
            result.push(Cluster::new(
                key.cluster_id,
                OnDiskPageMap::new(payload, index),
                columns,
            ));
        }
        Ok(result)
    }
}
