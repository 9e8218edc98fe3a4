// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{sha256_hex, Result};
use metagenome_model::{ObjectMetadata, Reference};
use metagenome_store::ObjectStore;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_METADATA_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    reference: Reference,
    token_digest: String,
}

#[derive(Clone)]
struct CacheEntry {
    metadata: ObjectMetadata,
    created_at: Instant,
}

/// Access-checked object metadata per (reference, token), expiring a fixed
/// window after the fetch regardless of use. Failures are never cached.
pub struct MetadataCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TTL, DEFAULT_METADATA_CAPACITY)
    }
}

impl MetadataCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_metadata(
        &self,
        store: &dyn ObjectStore,
        reference: &Reference,
        token: &str,
    ) -> Result<ObjectMetadata> {
        let key = CacheKey {
            reference: reference.clone(),
            token_digest: sha256_hex(token.as_bytes()),
        };
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|_, v| v.created_at.elapsed() <= self.ttl);
            if let Some(hit) = entries.get(&key) {
                debug!(reference = %reference, "metadata cache hit");
                return Ok(hit.metadata.clone());
            }
        }
        // Fetched outside the lock; a concurrent miss may fetch twice.
        let metadata = store.get_metadata(reference, token)?;
        self.insert(
            key,
            CacheEntry {
                metadata: metadata.clone(),
                created_at: Instant::now(),
            },
        );
        Ok(metadata)
    }

    fn insert(&self, key: CacheKey, entry: CacheEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, v| v.created_at.elapsed() <= self.ttl);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(key, entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagenome_core::ErrorCode;
    use metagenome_model::Fingerprint;
    use metagenome_store::fake::FakeObjectStore;
    use serde_json::json;

    fn store_with(refs: &[&str]) -> FakeObjectStore {
        let store = FakeObjectStore::new();
        for r in refs {
            store.insert(
                ObjectMetadata {
                    reference: Reference::parse(r).expect("ref"),
                    fingerprint: Fingerprint::parse("f00d").expect("fp"),
                    copied_from: None,
                    handle_id: None,
                },
                json!({}),
            );
        }
        store
    }

    #[test]
    fn hits_skip_the_store_until_expiry() {
        let store = store_with(&["1/1/1"]);
        let cache = MetadataCache::new(Duration::from_millis(80), 10);
        let r = Reference::parse("1/1/1").expect("ref");
        cache.get_metadata(&store, &r, "t").expect("first");
        cache.get_metadata(&store, &r, "t").expect("second");
        assert_eq!(store.metadata_calls(), 1);
        std::thread::sleep(Duration::from_millis(120));
        cache.get_metadata(&store, &r, "t").expect("third");
        assert_eq!(store.metadata_calls(), 2);
    }

    #[test]
    fn tokens_are_separate_entries() {
        let store = store_with(&["1/1/1"]);
        let cache = MetadataCache::default();
        let r = Reference::parse("1/1/1").expect("ref");
        cache.get_metadata(&store, &r, "alice").expect("a");
        cache.get_metadata(&store, &r, "bob").expect("b");
        assert_eq!(store.metadata_calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let store = store_with(&["1/1/1"]);
        store.deny_token("eve");
        let cache = MetadataCache::default();
        let r = Reference::parse("1/1/1").expect("ref");
        for _ in 0..2 {
            let err = cache.get_metadata(&store, &r, "eve").expect_err("denied");
            assert_eq!(err.code, ErrorCode::Access);
        }
        assert_eq!(store.metadata_calls(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let store = store_with(&["1/1/1", "2/2/2", "3/3/3"]);
        let cache = MetadataCache::new(Duration::from_secs(60), 2);
        for r in ["1/1/1", "2/2/2", "3/3/3"] {
            let r = Reference::parse(r).expect("ref");
            cache.get_metadata(&store, &r, "t").expect("meta");
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(cache.len(), 2);
        let oldest = Reference::parse("1/1/1").expect("ref");
        cache.get_metadata(&store, &oldest, "t").expect("refetch");
        assert_eq!(store.metadata_calls(), 4);
    }
}
