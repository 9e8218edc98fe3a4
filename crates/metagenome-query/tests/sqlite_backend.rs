// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{features, gzip_json, ids, metadata, HANDLE};
use metagenome_core::ErrorCode;
use metagenome_index::{BuildPool, EmbeddedIndexer, EmbeddedOptions};
use metagenome_model::{SortKey, SortSpec};
use metagenome_query::{
    FeatureIndexBackend, PageRequest, RegionRequest, SearchFields, SqliteBackend,
};
use metagenome_store::fake::FakeBlobStore;
use std::sync::Arc;

fn backend(dir: &std::path::Path) -> SqliteBackend {
    let blobs = Arc::new(FakeBlobStore::new());
    blobs.insert(HANDLE, gzip_json(&features()));
    let pool = Arc::new(BuildPool::new(1).expect("pool"));
    let indexer =
        EmbeddedIndexer::new(dir, EmbeddedOptions::default(), blobs, pool).expect("indexer");
    indexer.build_now(&metadata(), "t").expect("build");
    SqliteBackend::new(indexer, SearchFields::default())
}

fn query(text: &str) -> PageRequest {
    PageRequest {
        query: text.to_string(),
        ..PageRequest::default()
    }
}

#[test]
fn tokens_are_anded_across_fields() {
    let dir = tempfile::tempdir().expect("tmp");
    let b = backend(dir.path());
    assert!(b.ensure_ready(&metadata(), "t").expect("ready"));

    let kinase = b.query(&metadata(), "t", &query("kinase")).expect("kinase");
    assert_eq!(ids(&kinase.items, |f| &f.id), ["f1", "f3"]);
    assert_eq!(kinase.num_found, 2);

    let both = b
        .query(&metadata(), "t", &query("KINASE transporter"))
        .expect("both");
    assert_eq!(ids(&both.items, |f| &f.id), ["f3"]);

    let cds = b.query(&metadata(), "t", &query("CDS")).expect("type");
    assert_eq!(ids(&cds.items, |f| &f.id), ["f2", "f3"]);

    let none = b.query(&metadata(), "t", &query("f1 f2")).expect("ids");
    assert_eq!(none.num_found, 0);
}

#[test]
fn sort_and_window_are_applied_after_counting() {
    let dir = tempfile::tempdir().expect("tmp");
    let b = backend(dir.path());
    let request = PageRequest {
        sort: SortSpec::new(vec![SortKey::desc("starts")]),
        start: 1,
        limit: 2,
        ..PageRequest::default()
    };
    let page = b.query(&metadata(), "t", &request).expect("page");
    assert_eq!(page.num_found, 4);
    assert_eq!(ids(&page.items, |f| &f.id), ["f2", "f1"]);

    let by_contig = PageRequest {
        sort: SortSpec::new(vec![SortKey::desc("contig_ids")]),
        ..PageRequest::default()
    };
    let page = b.query(&metadata(), "t", &by_contig).expect("alias");
    assert_eq!(ids(&page.items, |f| &f.id), ["f4", "f1", "f2", "f3"]);
}

#[test]
fn unknown_sort_column_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp");
    let b = backend(dir.path());
    let request = PageRequest {
        sort: SortSpec::new(vec![SortKey::asc("score")]),
        ..PageRequest::default()
    };
    let err = b.query(&metadata(), "t", &request).expect_err("unknown");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.contains("please use one of [id, contig_id"));
}

#[test]
fn region_selects_true_overlaps_on_one_contig() {
    let dir = tempfile::tempdir().expect("tmp");
    let b = backend(dir.path());
    let region = RegionRequest {
        contig_id: "c1".to_string(),
        region_start: 150,
        region_length: 200,
        start: 0,
        limit: 10,
        sort: SortSpec::default(),
    };
    let page = b.query_region(&metadata(), "t", &region).expect("region");
    assert_eq!(ids(&page.items, |f| &f.id), ["f1", "f2"]);
    assert_eq!(page.num_found, 2);

    let tail = RegionRequest {
        region_start: 960,
        region_length: 5,
        ..region
    };
    let page = b.query_region(&metadata(), "t", &tail).expect("tail");
    assert_eq!(ids(&page.items, |f| &f.id), ["f3"]);
}

#[test]
fn counts_group_by_contig_and_type() {
    let dir = tempfile::tempdir().expect("tmp");
    let b = backend(dir.path());
    let by_contig = b.counts_by_contig(&metadata(), "t", 4000).expect("contigs");
    assert_eq!(by_contig.get("c1"), Some(&3));
    assert_eq!(by_contig.get("c2"), Some(&1));
    assert_eq!(b.counts_by_contig(&metadata(), "t", 1).expect("limited").len(), 1);
    assert_eq!(b.count_for_contig(&metadata(), "t", "c1").expect("c1"), 3);
    assert_eq!(b.count_for_contig(&metadata(), "t", "c9").expect("c9"), 0);
    let types = b.counts_by_type(&metadata(), "t").expect("types");
    assert_eq!(types.get("CDS"), Some(&2));
    assert_eq!(types.get("gene"), Some(&2));
}

#[test]
fn unbuilt_store_is_not_found() {
    let dir = tempfile::tempdir().expect("tmp");
    let pool = Arc::new(BuildPool::new(1).expect("pool"));
    let indexer = EmbeddedIndexer::new(
        dir.path(),
        EmbeddedOptions::default(),
        Arc::new(FakeBlobStore::new()),
        pool,
    )
    .expect("indexer");
    let b = SqliteBackend::new(indexer, SearchFields::default());
    let err = b
        .query(&metadata(), "t", &PageRequest::default())
        .expect_err("unbuilt");
    assert_eq!(err.code, ErrorCode::NotFound);
}
