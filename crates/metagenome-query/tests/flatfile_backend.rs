// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{features, gzip_json, ids, metadata, HANDLE};
use metagenome_index::{BuildPool, FlatFileIndexer, DEFAULT_IN_MEMORY_SORT_LIMIT};
use metagenome_model::{SortKey, SortSpec};
use metagenome_query::{FeatureIndexBackend, FlatFileFeatureBackend, PageRequest, RegionRequest};
use metagenome_store::fake::FakeBlobStore;
use std::sync::Arc;
use std::time::Duration;

fn ready_backend(dir: &std::path::Path) -> (FlatFileFeatureBackend, Arc<FakeBlobStore>) {
    let blobs = Arc::new(FakeBlobStore::new());
    blobs.insert(HANDLE, gzip_json(&features()));
    let pool = Arc::new(BuildPool::new(1).expect("pool"));
    let files = Arc::new(FlatFileIndexer::new(dir, DEFAULT_IN_MEMORY_SORT_LIMIT).expect("files"));
    let backend = FlatFileFeatureBackend::new(files, blobs.clone(), Arc::clone(&pool));
    assert!(!backend.ensure_ready(&metadata(), "t").expect("schedule"));
    assert!(pool.wait_idle(Duration::from_secs(10)));
    assert!(backend.ensure_ready(&metadata(), "t").expect("ready"));
    (backend, blobs)
}

#[test]
fn artifact_is_built_once_in_the_background() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, blobs) = ready_backend(dir.path());
    assert!(backend.ensure_ready(&metadata(), "t").expect("again"));
    assert_eq!(blobs.download_calls(), 1);
    assert!(dir.path().join("0a1b2c_feats.tsv.gz").is_file());
}

#[test]
fn filter_ignores_the_ordinal_and_ands_tokens() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, _) = ready_backend(dir.path());
    let both = PageRequest {
        query: "kinase TRANSPORTER".to_string(),
        ..PageRequest::default()
    };
    let page = backend.query(&metadata(), "t", &both).expect("both");
    assert_eq!(ids(&page.items, |f| &f.id), ["f3"]);

    // f4 sits at ordinal 3 and has no "3" anywhere else on its line.
    let ordinal = PageRequest {
        query: "f4 3".to_string(),
        ..PageRequest::default()
    };
    let page = backend.query(&metadata(), "t", &ordinal).expect("ordinal");
    assert_eq!(page.num_found, 0);
}

#[test]
fn filter_reads_display_fields_not_the_stored_record() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, _) = ready_backend(dir.path());
    for query in ["location", "functions", "\"id\"", "dna_sequence_length"] {
        let request = PageRequest {
            query: query.to_string(),
            ..PageRequest::default()
        };
        let page = backend.query(&metadata(), "t", &request).expect("query");
        assert_eq!(page.num_found, 0, "query {query}");
    }
    let contig = PageRequest {
        query: "c2".to_string(),
        ..PageRequest::default()
    };
    let page = backend.query(&metadata(), "t", &contig).expect("contig");
    assert_eq!(ids(&page.items, |f| &f.id), ["f4"]);
}

#[test]
fn default_order_is_file_order_and_sorts_resolve_by_column() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, _) = ready_backend(dir.path());
    let page = backend
        .query(&metadata(), "t", &PageRequest::default())
        .expect("all");
    assert_eq!(ids(&page.items, |f| &f.id), ["f1", "f2", "f3", "f4"]);

    let by_stop = PageRequest {
        sort: SortSpec::new(vec![SortKey::desc("stops")]),
        ..PageRequest::default()
    };
    let page = backend.query(&metadata(), "t", &by_stop).expect("sorted");
    assert_eq!(ids(&page.items, |f| &f.id), ["f3", "f2", "f1", "f4"]);
}

#[test]
fn known_total_returns_the_same_items() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, _) = ready_backend(dir.path());
    let exact = PageRequest {
        start: 1,
        limit: 2,
        ..PageRequest::default()
    };
    let full = backend.query(&metadata(), "t", &exact).expect("full");
    let short = backend
        .query(
            &metadata(),
            "t",
            &PageRequest {
                known_total: Some(full.num_found),
                ..exact.clone()
            },
        )
        .expect("short");
    assert_eq!(full.items, short.items);
    assert_eq!(short.num_found, 4);
}

#[test]
fn region_and_counts_read_the_artifact() {
    let dir = tempfile::tempdir().expect("tmp");
    let (backend, _) = ready_backend(dir.path());
    let region = RegionRequest {
        contig_id: "c1".to_string(),
        region_start: 150,
        region_length: 200,
        start: 0,
        limit: 10,
        sort: SortSpec::default(),
    };
    let page = backend.query_region(&metadata(), "t", &region).expect("region");
    assert_eq!(ids(&page.items, |f| &f.id), ["f1", "f2"]);

    let counts = backend.counts_by_contig(&metadata(), "t", 10).expect("counts");
    assert_eq!(counts.get("c1"), Some(&3));
    assert_eq!(backend.count_for_contig(&metadata(), "t", "c2").expect("c2"), 1);
    let types = backend.counts_by_type(&metadata(), "t").expect("types");
    assert_eq!(types.get("gene"), Some(&2));
}
