// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for tests and local runs. Each fake counts its
//! calls so callers can assert that cached or linked paths skip fetches.

use metagenome_core::{Error, Result};
use metagenome_model::{ObjectMetadata, Reference};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{BlobStore, ObjectStore, ResultCache, SearchService};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct FakeObject {
    metadata: ObjectMetadata,
    data: Value,
}

#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<Reference, FakeObject>>,
    denied: Mutex<HashSet<String>>,
    pub metadata_calls: AtomicU64,
    pub field_calls: AtomicU64,
}

impl FakeObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, metadata: ObjectMetadata, data: Value) {
        guard(&self.objects).insert(metadata.reference.clone(), FakeObject { metadata, data });
    }

    /// Every call made with `token` fails the access check.
    pub fn deny_token(&self, token: &str) {
        guard(&self.denied).insert(token.to_string());
    }

    #[must_use]
    pub fn metadata_calls(&self) -> u64 {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn field_calls(&self) -> u64 {
        self.field_calls.load(Ordering::SeqCst)
    }

    fn check_access(&self, reference: &Reference, token: &str) -> Result<()> {
        if guard(&self.denied).contains(token) {
            return Err(Error::access(format!("token may not read {reference}")));
        }
        Ok(())
    }
}

impl ObjectStore for FakeObjectStore {
    fn get_metadata(&self, reference: &Reference, token: &str) -> Result<ObjectMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_access(reference, token)?;
        guard(&self.objects)
            .get(reference)
            .map(|o| o.metadata.clone())
            .ok_or_else(|| Error::not_found(format!("no object {reference}")))
    }

    fn get_fields(&self, reference: &Reference, token: &str, paths: &[String]) -> Result<Value> {
        self.field_calls.fetch_add(1, Ordering::SeqCst);
        self.check_access(reference, token)?;
        let objects = guard(&self.objects);
        let object = objects
            .get(reference)
            .ok_or_else(|| Error::not_found(format!("no object {reference}")))?;
        let mut out = Value::Object(Map::new());
        for path in paths {
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            if let Some(projected) = project(&object.data, &segments) {
                merge(&mut out, projected);
            }
        }
        Ok(out)
    }
}

/// Workspace-style projection: `[*]` fans out over an array, a numeric
/// segment keeps only that element (as a one-element array).
fn project(value: &Value, segments: &[&str]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Array(items) if *head == "[*]" => Some(Value::Array(
            items.iter().filter_map(|v| project(v, rest)).collect(),
        )),
        Value::Array(items) => {
            let idx: usize = head.parse().ok()?;
            let projected = project(items.get(idx)?, rest)?;
            Some(Value::Array(vec![projected]))
        }
        Value::Object(map) => {
            let projected = project(map.get(*head)?, rest)?;
            let mut out = Map::new();
            out.insert((*head).to_string(), projected);
            Some(Value::Object(out))
        }
        _ => None,
    }
}

fn merge(into: &mut Value, from: Value) {
    match (into, from) {
        (Value::Object(a), Value::Object(b)) => {
            for (k, v) in b {
                match a.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        a.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for (i, v) in b.into_iter().enumerate() {
                match a.get_mut(i) {
                    Some(existing) => merge(existing, v),
                    None => a.push(v),
                }
            }
        }
        (slot, other) => *slot = other,
    }
}

#[derive(Default)]
pub struct FakeBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    pub resolve_calls: AtomicU64,
    pub download_calls: AtomicU64,
}

const FAKE_SCHEME: &str = "fake://";

impl FakeBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle_id: &str, bytes: Vec<u8>) {
        guard(&self.blobs).insert(handle_id.to_string(), bytes);
    }

    #[must_use]
    pub fn download_calls(&self) -> u64 {
        self.download_calls.load(Ordering::SeqCst)
    }
}

impl BlobStore for FakeBlobStore {
    fn resolve(&self, handle_id: &str, _token: &str) -> Result<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if guard(&self.blobs).contains_key(handle_id) {
            Ok(format!("{FAKE_SCHEME}{handle_id}"))
        } else {
            Err(Error::not_found(format!("no handle with id {handle_id}")))
        }
    }

    fn download(&self, url: &str, _token: &str) -> Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let id = url.strip_prefix(FAKE_SCHEME).unwrap_or(url);
        guard(&self.blobs)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no blob at {url}")))
    }
}

#[derive(Default)]
pub struct MemoryResultCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    pub puts: AtomicU64,
}

impl MemoryResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        guard(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryResultCache {
    fn get(&self, key: &str, _token: &str) -> Result<Option<Vec<u8>>> {
        Ok(guard(&self.entries).get(key).cloned())
    }

    fn put(&self, key: &str, _token: &str, bytes: &[u8]) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        guard(&self.entries).insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

type Responder = Box<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Search service answering through a closure and recording every request.
pub struct FakeSearchService {
    responder: Responder,
    requests: Mutex<Vec<Value>>,
}

impl FakeSearchService {
    pub fn new(responder: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<Value> {
        guard(&self.requests).clone()
    }
}

impl SearchService for FakeSearchService {
    fn search(&self, request: &Value, _token: &str) -> Result<Value> {
        guard(&self.requests).push(request.clone());
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagenome_core::ErrorCode;
    use metagenome_model::Fingerprint;
    use serde_json::json;

    #[test]
    fn projection_fans_out_and_selects() {
        let data = json!({
            "bins": [
                {"bid": "a", "gc": 0.5, "contigs": {"c1": {"len": 10}}},
                {"bid": "b", "gc": 0.6, "contigs": {"c2": {"len": 20}}}
            ],
            "other": 1
        });
        let mut out = Value::Object(Map::new());
        merge(&mut out, project(&data, &["bins", "[*]", "bid"]).expect("bid"));
        merge(&mut out, project(&data, &["bins", "[*]", "gc"]).expect("gc"));
        assert_eq!(out, json!({"bins": [{"bid": "a", "gc": 0.5}, {"bid": "b", "gc": 0.6}]}));

        let mut one = Value::Object(Map::new());
        merge(&mut one, project(&data, &["bins", "1", "contigs"]).expect("contigs"));
        merge(&mut one, project(&data, &["bins", "1", "bid"]).expect("bid"));
        assert_eq!(
            one,
            json!({"bins": [{"contigs": {"c2": {"len": 20}}, "bid": "b"}]})
        );
    }

    fn store() -> (FakeObjectStore, Reference) {
        let reference = Reference::parse("1/2/3").expect("ref");
        let store = FakeObjectStore::new();
        store.insert(
            ObjectMetadata {
                reference: reference.clone(),
                fingerprint: Fingerprint::parse("abc123").expect("fp"),
                copied_from: None,
                handle_id: Some("KBH_1".to_string()),
            },
            json!({"contig_ids": ["c1", "c2"], "contig_lengths": [10, 20]}),
        );
        (store, reference)
    }

    #[test]
    fn denied_tokens_fail_with_access_errors() {
        let (store, reference) = store();
        store.deny_token("intruder");
        let err = store
            .get_metadata(&reference, "intruder")
            .expect_err("denied");
        assert_eq!(err.code, ErrorCode::Access);
        assert!(store.get_metadata(&reference, "owner").is_ok());
        assert_eq!(store.metadata_calls(), 2);
    }

    #[test]
    fn unknown_references_are_not_found() {
        let (store, _) = store();
        let other = Reference::parse("9/9/9").expect("ref");
        let err = store.get_metadata(&other, "t").expect_err("missing");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn field_projection_returns_only_requested_paths() {
        let (store, reference) = store();
        let data = store
            .get_fields(&reference, "t", &["contig_ids".to_string()])
            .expect("fields");
        assert_eq!(data, json!({"contig_ids": ["c1", "c2"]}));
        assert_eq!(store.field_calls(), 1);
    }

    #[test]
    fn blob_store_resolves_then_downloads() {
        let blobs = FakeBlobStore::new();
        blobs.insert("KBH_1", b"payload".to_vec());
        let url = blobs.resolve("KBH_1", "t").expect("resolve");
        assert_eq!(blobs.download(&url, "t").expect("download"), b"payload");
        assert_eq!(blobs.download_calls(), 1);
        assert_eq!(
            blobs.resolve("KBH_2", "t").expect_err("missing").code,
            ErrorCode::NotFound
        );
    }

    #[test]
    fn memory_cache_overwrites_entries() {
        let cache = MemoryResultCache::new();
        assert!(cache.get("k", "t").expect("get").is_none());
        cache.put("k", "t", b"one").expect("put");
        cache.put("k", "t", b"two").expect("put");
        assert_eq!(cache.get("k", "t").expect("get").as_deref(), Some(&b"two"[..]));
        assert_eq!(cache.puts(), 2);
        assert_eq!(cache.len(), 1);
    }
}
