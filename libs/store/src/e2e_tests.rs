#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tessera_daos::{Container, ObjectId, Pool};

    use crate::{
        seal_page, ClusterDescriptor, ClusterGroupDescriptor, ClusterKey, ColumnDescriptor,
        ColumnId, ColumnType, Compressor, Error, Page, PageInfo, PageList, PageRange, PageSink,
        PageSource, ReadOptions, SealedPage, TupleFooter, TupleHeader, WriteOptions,
    };

    fn two_column_header() -> TupleHeader {
        TupleHeader {
            version: 1,
            name: "hits".to_string(),
            columns: vec![
                ColumnDescriptor {
                    column_id: 0,
                    name: "energy".to_string(),
                    column_type: ColumnType::Real64,
                },
                ColumnDescriptor {
                    column_id: 1,
                    name: "charge".to_string(),
                    column_type: ColumnType::Int32,
                },
            ],
        }
    }

    fn real64_bytes(range: std::ops::Range<u64>) -> Vec<u8> {
        range.flat_map(|i| (i as f64 * 0.5).to_le_bytes()).collect()
    }

    fn int32_bytes(range: std::ops::Range<u64>) -> Vec<u8> {
        range.flat_map(|i| (i as i32 - 3).to_le_bytes()).collect()
    }

    fn page_range(column_id: ColumnId, pages: Vec<PageInfo>) -> (ColumnId, PageRange) {
        (column_id, PageRange { column_id, pages })
    }

    /// Write a two-column, two-cluster tuple and return the sealed bytes of
    /// every page, keyed by (cluster, column).
    fn write_two_cluster_tuple(uri: &str) -> Vec<((u64, ColumnId), Vec<u8>)> {
        let header = two_column_header();
        let mut sink = PageSink::new(uri, WriteOptions::default()).unwrap();
        sink.create(&header.to_bytes().unwrap()).unwrap();

        let compressor = Compressor::new(0);
        let mut sealed_bytes = Vec::new();
        let mut clusters = Vec::new();
        let entry_splits = [(0u64, 10u64), (10u64, 6u64)];

        for (cluster_id, &(first_entry, n_entries)) in entry_splits.iter().enumerate() {
            let entries = first_entry..first_entry + n_entries;
            let energy = Page::from_bytes(0, ColumnType::Real64, real64_bytes(entries.clone()))
                .unwrap();
            let charge = Page::from_bytes(1, ColumnType::Int32, int32_bytes(entries)).unwrap();

            // One column goes through the pre-sealed path, the other through
            // commit_page, so both entry points see traffic.
            let sealed_energy = seal_page(&energy, &compressor).unwrap();
            let loc_energy = sink.commit_sealed_page(0, &sealed_energy).unwrap();
            sealed_bytes.push(((cluster_id as u64, 0), sealed_energy.buf.clone()));

            let loc_charge = sink.commit_page(&charge).unwrap();
            let sealed_charge = seal_page(&charge, &compressor).unwrap();
            sealed_bytes.push(((cluster_id as u64, 1), sealed_charge.buf));

            assert!(loc_charge.position > loc_energy.position);
            sink.commit_cluster(n_entries).unwrap();

            clusters.push(ClusterDescriptor {
                first_entry,
                n_entries,
                page_ranges: BTreeMap::from([
                    page_range(
                        0,
                        vec![PageInfo {
                            n_elements: n_entries as u32,
                            locator: loc_energy,
                        }],
                    ),
                    page_range(
                        1,
                        vec![PageInfo {
                            n_elements: n_entries as u32,
                            locator: loc_charge,
                        }],
                    ),
                ]),
            });
        }

        let page_list = PageList { clusters };
        let page_list_bytes = page_list.to_bytes().unwrap();
        let group_locator = sink.commit_cluster_group(&page_list_bytes).unwrap();

        let footer = TupleFooter {
            n_entries: 16,
            cluster_groups: vec![ClusterGroupDescriptor {
                n_clusters: 2,
                page_list_len: page_list_bytes.len() as u32,
                page_list_locator: group_locator,
            }],
        };
        sink.commit_dataset(&footer.to_bytes().unwrap()).unwrap();
        sealed_bytes
    }

    #[test]
    fn test_single_page_key_layout_on_storage() {
        let mut sink = PageSink::new("daos://e2e-pool-key/c", WriteOptions::default()).unwrap();
        sink.create(&two_column_header().to_bytes().unwrap()).unwrap();

        let sealed = SealedPage {
            buf: vec![0xcdu8; 1024],
            n_elements: 256,
        };
        let locator = sink.commit_sealed_page(3, &sealed).unwrap();
        assert_eq!(locator.position, 0);
        assert_eq!(locator.bytes_on_storage, 1024);

        // Under the cluster-per-object layout the page must land exactly on
        // oid=(0,0), dkey=3, akey=0.
        let pool = Pool::connect("e2e-pool-key").unwrap();
        let container = Container::open(pool, "c", false).unwrap();
        let mut buf = vec![0u8; 2048];
        let n = container
            .read_single_akey(&mut buf, ObjectId::new(0, 0), 3, 0)
            .unwrap();
        assert_eq!(n, 1024);
        assert_eq!(&buf[..n], &sealed.buf[..]);
    }

    #[test]
    fn test_sink_source_fidelity() -> anyhow::Result<()> {
        let uri = "daos://e2e-pool-fidelity/c";
        let sealed_written = write_two_cluster_tuple(uri);

        let mut source = PageSource::new(uri, ReadOptions::default())?;
        let descriptor = source.attach()?;
        assert_eq!(descriptor.name(), "hits");
        assert_eq!(descriptor.columns().len(), 2);
        assert_eq!(descriptor.clusters().len(), 2);
        assert_eq!(descriptor.n_entries(), 16);
        assert_eq!(source.object_class(), "OC_SX");

        // Every sealed page reads back byte-identical.
        for ((cluster_id, column_id), written) in &sealed_written {
            let meta = source.load_sealed_page(*column_id, *cluster_id, 0, None)?;
            assert_eq!(meta.bytes_on_storage as usize, written.len());
            let mut buf = vec![0u8; written.len()];
            source.load_sealed_page(*column_id, *cluster_id, 0, Some(&mut buf))?;
            assert_eq!(&buf, written);
        }

        // Populated pages decode to the original elements.
        let page = source.populate_page(0, 12)?;
        assert_eq!(page.cluster_id, 1);
        assert_eq!(page.first_global, 10);
        assert_eq!(page.n_elements, 6);
        assert_eq!(page.buf, real64_bytes(10..16));

        let page = source.populate_page(1, 0)?;
        assert_eq!(page.buf, int32_bytes(0..10));

        // Second request for a covered entry is served from the page pool.
        let again = source.populate_page(0, 15)?;
        assert_eq!(again.first_global, 10);
        Ok(())
    }

    #[test]
    fn test_populate_page_without_cluster_cache() {
        let uri = "daos://e2e-pool-nocache/c";
        write_two_cluster_tuple(uri);

        let mut source = PageSource::new(uri, ReadOptions::without_cluster_cache()).unwrap();
        source.attach().unwrap();
        let page = source.populate_page(0, 3).unwrap();
        assert_eq!(page.cluster_id, 0);
        assert_eq!(page.buf, real64_bytes(0..10));
    }

    #[test]
    fn test_load_clusters_batches_full_cluster() {
        let uri = "daos://e2e-pool-loadv/c";
        let sealed_written = write_two_cluster_tuple(uri);

        let mut source = PageSource::new(uri, ReadOptions::default()).unwrap();
        source.attach().unwrap();

        let clusters = source
            .load_clusters(&[
                ClusterKey {
                    cluster_id: 0,
                    columns: vec![0, 1],
                },
                ClusterKey {
                    cluster_id: 1,
                    columns: vec![0, 1],
                },
            ])
            .unwrap();
        assert_eq!(clusters.len(), 2);
        for cluster in &clusters {
            assert_eq!(cluster.n_on_disk_pages(), 2);
            for column_id in [0u64, 1] {
                let sealed = cluster.on_disk_page(column_id, 0).unwrap();
                let written = sealed_written
                    .iter()
                    .find(|((c, col), _)| *c == cluster.id() && *col == column_id)
                    .map(|(_, bytes)| bytes)
                    .unwrap();
                assert_eq!(sealed, &written[..]);
            }
        }
    }

    #[test]
    fn test_load_clusters_skips_absent_columns() {
        let uri = "daos://e2e-pool-subset/c";
        write_two_cluster_tuple(uri);

        let mut source = PageSource::new(uri, ReadOptions::default()).unwrap();
        source.attach().unwrap();
        let clusters = source
            .load_clusters(&[ClusterKey {
                cluster_id: 0,
                // Column 9 does not exist; its pages are simply not enumerated.
                columns: vec![1, 9],
            }])
            .unwrap();
        assert_eq!(clusters[0].n_on_disk_pages(), 1);
        assert!(clusters[0].on_disk_page(0, 0).is_none());
        assert!(clusters[0].on_disk_page(1, 0).is_some());
    }

    #[test]
    fn test_create_existing_container_then_roundtrip() {
        // Pre-create the container, then let the sink create it again: the
        // soft already-exists error must not surface.
        let pool = Pool::connect("e2e-pool-exist").unwrap();
        drop(Container::open(pool, "c", true).unwrap());

        let uri = "daos://e2e-pool-exist/c";
        let header = two_column_header();
        let mut sink = PageSink::new(uri, WriteOptions::default()).unwrap();
        sink.create(&header.to_bytes().unwrap()).unwrap();
        let footer = TupleFooter {
            n_entries: 0,
            cluster_groups: vec![],
        };
        sink.commit_dataset(&footer.to_bytes().unwrap()).unwrap();

        let mut source = PageSource::new(uri, ReadOptions::default()).unwrap();
        let descriptor = source.attach().unwrap();
        assert_eq!(descriptor.name(), "hits");
        assert_eq!(descriptor.clusters().len(), 0);
        assert_eq!(descriptor.n_entries(), 0);
    }

    #[test]
    fn test_attach_merges_multiple_cluster_groups() {
        let uri = "daos://e2e-pool-groups/c";
        let header = TupleHeader {
            version: 1,
            name: "t".to_string(),
            columns: vec![ColumnDescriptor {
                column_id: 0,
                name: "v".to_string(),
                column_type: ColumnType::Byte,
            }],
        };
        let mut sink = PageSink::new(uri, WriteOptions::default()).unwrap();
        sink.create(&header.to_bytes().unwrap()).unwrap();

        let mut groups = Vec::new();
        let mut first_entry = 0u64;
        for _ in 0..2 {
            let page = Page::from_bytes(0, ColumnType::Byte, vec![0xa5u8; 8]).unwrap();
            let locator = sink.commit_page(&page).unwrap();
            sink.commit_cluster(8).unwrap();

            let page_list = PageList {
                clusters: vec![ClusterDescriptor {
                    first_entry,
                    n_entries: 8,
                    page_ranges: BTreeMap::from([page_range(
                        0,
                        vec![PageInfo {
                            n_elements: 8,
                            locator,
                        }],
                    )]),
                }],
            };
            let bytes = page_list.to_bytes().unwrap();
            let group_locator = sink.commit_cluster_group(&bytes).unwrap();
            groups.push(ClusterGroupDescriptor {
                n_clusters: 1,
                page_list_len: bytes.len() as u32,
                page_list_locator: group_locator,
            });
            first_entry += 8;
        }

        let footer = TupleFooter {
            n_entries: 16,
            cluster_groups: groups,
        };
        sink.commit_dataset(&footer.to_bytes().unwrap()).unwrap();

        let mut source = PageSource::new(uri, ReadOptions::default()).unwrap();
        let descriptor = source.attach().unwrap();
        assert_eq!(descriptor.clusters().len(), 2);
        assert_eq!(descriptor.clusters()[1].first_entry, 8);
        let page = source.populate_page(0, 9).unwrap();
        assert_eq!(page.buf, vec![0xa5u8; 8]);
    }

    #[test]
    fn test_source_rejects_unknown_anchor_class() {
        // Hand-write an anchor carrying a class this build does not know.
        let pool = Pool::connect("e2e-pool-badclass").unwrap();
        let container = Container::open(pool, "c", true).unwrap();
        let anchor = crate::TupleAnchor {
            obj_class: "OC_FUTURE".to_string(),
            ..Default::default()
        };
        let key = crate::metadata_key(
            crate::MappingStrategy::ClusterDColumn,
            crate::MetadataKind::Anchor,
        );
        container
            .write_single_akey(&anchor.serialize(), key.oid, key.dkey, key.akey)
            .unwrap();
        drop(container);

        let mut source =
            PageSource::new("daos://e2e-pool-badclass/c", ReadOptions::default()).unwrap();
        assert!(matches!(
            source.attach(),
            Err(Error::UnknownObjectClass(_))
        ));
    }

    #[test]
    fn test_locator_gap_after_cluster_group() {
        let uri = "daos://e2e-pool-gap/c";
        let header = two_column_header();
        let mut sink = PageSink::new(uri, WriteOptions::default()).unwrap();
        sink.create(&header.to_bytes().unwrap()).unwrap();

        let page = Page::from_bytes(0, ColumnType::Real64, real64_bytes(0..4)).unwrap();
        let first = sink.commit_page(&page).unwrap();
        sink.commit_cluster(4).unwrap();
        let page_list = PageList {
            clusters: vec![ClusterDescriptor {
                first_entry: 0,
                n_entries: 4,
                page_ranges: BTreeMap::from([page_range(
                    0,
                    vec![PageInfo {
                        n_elements: 4,
                        locator: first,
                    }],
                )]),
            }],
        };
        let group = sink.commit_cluster_group(&page_list.to_bytes().unwrap()).unwrap();
        let next = sink.commit_page(&page).unwrap();

        // Positions strictly increase; the group commit consumed one offset.
        assert_eq!(group.position, first.position + 1);
        assert_eq!(next.position, group.position + 1);
    }
}
