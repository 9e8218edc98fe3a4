// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{assembly, features, gzip_json, ids, metadata, HANDLE};
use metagenome_core::ErrorCode;
use metagenome_index::{BuildPool, EmbeddedIndexer, EmbeddedOptions};
use metagenome_model::{ContigPage, ContigSummary, SortKey, SortSpec};
use metagenome_query::contigs::cache_key;
use metagenome_query::{ContigComposite, ContigsRequest, SearchFields, SqliteBackend};
use metagenome_store::fake::{FakeBlobStore, FakeObjectStore, MemoryResultCache};
use metagenome_store::ResultCache;
use serde_json::json;
use std::sync::Arc;

struct Fixture {
    _dir: tempfile::TempDir,
    store: FakeObjectStore,
    backend: SqliteBackend,
    cache: MemoryResultCache,
}

fn fixture(built: bool) -> Fixture {
    let dir = tempfile::tempdir().expect("tmp");
    let store = FakeObjectStore::new();
    store.insert(metadata(), assembly());
    let blobs = Arc::new(FakeBlobStore::new());
    if built {
        blobs.insert(HANDLE, gzip_json(&features()));
    }
    let pool = Arc::new(BuildPool::new(1).expect("pool"));
    let indexer = EmbeddedIndexer::new(dir.path(), EmbeddedOptions::default(), blobs, pool)
        .expect("indexer");
    if built {
        indexer.build_now(&metadata(), "t").expect("build");
    }
    Fixture {
        _dir: dir,
        store,
        backend: SqliteBackend::new(indexer, SearchFields::default()),
        cache: MemoryResultCache::new(),
    }
}

impl Fixture {
    fn composite(&self) -> ContigComposite<'_> {
        ContigComposite {
            store: &self.store,
            backend: &self.backend,
            cache: &self.cache,
        }
    }
}

fn by_count_desc() -> ContigsRequest {
    ContigsRequest {
        sort: SortSpec::new(vec![SortKey::desc("feature_count")]),
        ..ContigsRequest::default()
    }
}

#[test]
fn contigs_carry_lengths_and_feature_counts() {
    let fx = fixture(true);
    let page = fx
        .composite()
        .search_contigs(&metadata(), "t", &by_count_desc())
        .expect("page");
    assert_eq!(page.num_found, 3);
    assert_eq!(ids(&page.contigs, |c| &c.contig_id), ["c1", "c2", "c3"]);
    assert_eq!(
        page.contigs[0],
        ContigSummary {
            contig_id: "c1".to_string(),
            length: 5000,
            feature_count: 3
        }
    );
    assert_eq!(page.contigs[2].feature_count, 0);

    let by_length = ContigsRequest {
        sort: SortSpec::new(vec![SortKey::asc("length")]),
        start: 1,
        limit: 1,
    };
    let page = fx
        .composite()
        .search_contigs(&metadata(), "t", &by_length)
        .expect("length");
    assert_eq!(ids(&page.contigs, |c| &c.contig_id), ["c3"]);
}

#[test]
fn computed_pages_are_cached_and_reused() {
    let fx = fixture(true);
    let first = fx
        .composite()
        .search_contigs(&metadata(), "t", &by_count_desc())
        .expect("first");
    assert_eq!(fx.cache.puts(), 1);
    let calls = fx.store.field_calls();
    let second = fx
        .composite()
        .search_contigs(&metadata(), "t", &by_count_desc())
        .expect("second");
    assert_eq!(first, second);
    assert_eq!(fx.store.field_calls(), calls);
    assert_eq!(fx.cache.puts(), 1);
}

#[test]
fn zero_sum_cached_page_is_recomputed() {
    let fx = fixture(true);
    let request = by_count_desc();
    let key = cache_key(&metadata(), &request).expect("key");
    let suspect = ContigPage {
        contigs: vec![ContigSummary {
            contig_id: "c1".to_string(),
            length: 5000,
            feature_count: 0,
        }],
        num_found: 3,
        start: 0,
    };
    fx.cache
        .put(&key, "t", &serde_json::to_vec(&suspect).expect("json"))
        .expect("seed");
    let page = fx
        .composite()
        .search_contigs(&metadata(), "t", &request)
        .expect("page");
    assert_eq!(page.feature_count_sum(), 4);
    assert_eq!(fx.cache.puts(), 2);
    let stored: ContigPage =
        serde_json::from_slice(&fx.cache.get(&key, "t").expect("get").expect("entry"))
            .expect("page");
    assert_eq!(stored, page);
}

#[test]
fn pages_computed_while_indexing_are_not_cached() {
    let fx = fixture(false);
    let page = fx
        .composite()
        .search_contigs(&metadata(), "t", &ContigsRequest::default())
        .expect("page");
    assert_eq!(page.num_found, 3);
    assert_eq!(page.feature_count_sum(), 0);
    assert!(fx.cache.is_empty());
}

#[test]
fn mismatched_contig_arrays_are_rejected() {
    let fx = fixture(true);
    fx.store.insert(
        metadata(),
        json!({"contig_ids": ["c1", "c2"], "contig_lengths": [10]}),
    );
    let err = fx
        .composite()
        .search_contigs(&metadata(), "t", &ContigsRequest::default())
        .expect_err("mismatch");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(err.message.contains("sizes do not match"));
}

#[test]
fn contig_info_reports_one_contig() {
    let fx = fixture(true);
    let info = fx.composite().contig_info(&metadata(), "t", "c2").expect("c2");
    assert_eq!(info.length, 200);
    assert_eq!(info.feature_count, 1);
    let err = fx
        .composite()
        .contig_info(&metadata(), "t", "nope")
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
}
