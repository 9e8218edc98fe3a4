// SPDX-License-Identifier: Apache-2.0

//! Per-reference SQLite feature stores.
//!
//! A reference moves `Unindexed -> Building -> Ready`, or straight to
//! `Ready` when its copy source already has a store to link. `Ready` is
//! terminal. A crashed build leaves a lease that goes stale after the
//! timeout, returning the reference to `Unindexed`.

use metagenome_core::fs::{link_shared, publish_no_clobber, temp_path_for};
use metagenome_core::Result;
use metagenome_model::{ObjectMetadata, Reference};
use metagenome_store::BlobStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::builder::BuildPool;
use crate::lease::{is_live, lease_path_for, BuildLease, DEFAULT_LEASE_TIMEOUT};
use crate::payload::fetch_features;
use crate::sqlite::{write_feature_store, WriteOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Unindexed,
    Building,
    Ready,
}

#[derive(Debug, Clone)]
pub struct EmbeddedOptions {
    pub lease_timeout: Duration,
    pub write: WriteOptions,
}

impl Default for EmbeddedOptions {
    fn default() -> Self {
        Self {
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            write: WriteOptions::default(),
        }
    }
}

/// Paths and the blocking build; shared with pool workers.
struct StoreBuilder {
    dir: PathBuf,
    options: EmbeddedOptions,
    blobs: Arc<dyn BlobStore>,
}

impl StoreBuilder {
    fn store_path(&self, reference: &Reference) -> PathBuf {
        self.dir.join(format!("{}.sqlite", reference.file_key()))
    }

    /// Links the copy source's store into place when it exists.
    fn link_from_copy(&self, metadata: &ObjectMetadata, store: &Path) -> Result<bool> {
        let Some(source_ref) = &metadata.copied_from else {
            return Ok(false);
        };
        let source = self.store_path(source_ref);
        if !source.is_file() {
            return Ok(false);
        }
        let linked = link_shared(&source, store)?;
        info!(
            reference = %metadata.reference,
            source = %source_ref,
            linked,
            "feature store shared from copy source"
        );
        Ok(true)
    }

    fn build(&self, metadata: &ObjectMetadata, token: &str) -> Result<()> {
        let store = self.store_path(&metadata.reference);
        if store.is_file() || self.link_from_copy(metadata, &store)? {
            return Ok(());
        }
        let lease_path = lease_path_for(&store);
        let Some(mut lease) = BuildLease::try_acquire(&lease_path, self.options.lease_timeout)?
        else {
            debug!(reference = %metadata.reference, "build owned by another worker");
            return Ok(());
        };
        if store.is_file() {
            return lease.release();
        }
        let started = Instant::now();
        info!(reference = %metadata.reference, store = %store.display(), "feature store build started");
        let features = fetch_features(self.blobs.as_ref(), metadata, token)?;
        let tmp = temp_path_for(&store)?;
        let stats = write_feature_store(&tmp, features, &self.options.write, |_| lease.renew())
            .inspect_err(|_| {
                let _ = std::fs::remove_file(&tmp);
            })?;
        if stats.duplicates > 0 {
            warn!(
                reference = %metadata.reference,
                duplicates = stats.duplicates,
                "duplicate feature ids skipped"
            );
        }
        let published = publish_no_clobber(&tmp, &store)?;
        if !published {
            debug!(reference = %metadata.reference, "store published by a competing builder");
        }
        if let Some(source_ref) = &metadata.copied_from {
            let source = self.store_path(source_ref);
            if !source.exists() {
                link_shared(&store, &source)?;
                debug!(source = %source_ref, "copy source linked to new store");
            }
        }
        lease.release()?;
        info!(
            reference = %metadata.reference,
            inserted = stats.inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "feature store build finished"
        );
        Ok(())
    }
}

pub struct EmbeddedIndexer {
    builder: Arc<StoreBuilder>,
    pool: Arc<BuildPool>,
}

impl EmbeddedIndexer {
    pub fn new(
        dir: &Path,
        options: EmbeddedOptions,
        blobs: Arc<dyn BlobStore>,
        pool: Arc<BuildPool>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            builder: Arc::new(StoreBuilder {
                dir: dir.to_path_buf(),
                options,
                blobs,
            }),
            pool,
        })
    }

    #[must_use]
    pub fn store_path(&self, reference: &Reference) -> PathBuf {
        self.builder.store_path(reference)
    }

    #[must_use]
    pub fn pool(&self) -> &BuildPool {
        &self.pool
    }

    pub fn state(&self, reference: &Reference) -> Result<IndexState> {
        let store = self.store_path(reference);
        if store.is_file() {
            return Ok(IndexState::Ready);
        }
        if self.pool.is_in_flight(&reference.file_key())
            || is_live(&lease_path_for(&store), self.builder.options.lease_timeout)?
        {
            return Ok(IndexState::Building);
        }
        Ok(IndexState::Unindexed)
    }

    /// `true` when the store is queryable now. Otherwise a background build
    /// is scheduled (unless one is live) and `false` is returned.
    pub fn ensure_index(&self, metadata: &ObjectMetadata, token: &str) -> Result<bool> {
        let store = self.store_path(&metadata.reference);
        if store.is_file() {
            return Ok(true);
        }
        if self.builder.link_from_copy(metadata, &store)? {
            return Ok(true);
        }
        if is_live(&lease_path_for(&store), self.builder.options.lease_timeout)? {
            debug!(reference = %metadata.reference, "feature store build in progress");
            return Ok(false);
        }
        let builder = Arc::clone(&self.builder);
        let job_metadata = metadata.clone();
        let job_token = token.to_string();
        let submitted = self
            .pool
            .submit(&metadata.reference.file_key(), move || {
                builder.build(&job_metadata, &job_token)
            });
        debug!(reference = %metadata.reference, submitted, "feature store build requested");
        Ok(false)
    }

    /// Builds on the calling thread; used by tools and tests that need the
    /// store before continuing.
    pub fn build_now(&self, metadata: &ObjectMetadata, token: &str) -> Result<()> {
        self.builder.build(metadata, token)
    }
}
