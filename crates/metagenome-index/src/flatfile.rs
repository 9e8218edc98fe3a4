// SPDX-License-Identifier: Apache-2.0

//! Gzip TSV artifacts: one base file per (key, kind), plus sorted secondary
//! files derived on demand and named by sort signature. Artifacts are never
//! mutated once published.

use flate2::write::GzEncoder;
use flate2::Compression;
use metagenome_core::fs::{publish_no_clobber, temp_path_for};
use metagenome_core::{Error, Result};
use metagenome_model::SortSpec;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::columns::{signature_of, RecordKind};
use crate::lines::LineSource;
use crate::sort::{ExternalSort, SortStrategy};

pub const DEFAULT_IN_MEMORY_SORT_LIMIT: u64 = 250_000;

pub struct FlatFileIndexer {
    dir: PathBuf,
    in_memory_sort_limit: u64,
    persisting_sort: Arc<dyn SortStrategy>,
    streaming_sort: Arc<dyn SortStrategy>,
}

impl FlatFileIndexer {
    /// Large inputs are sorted by the system `sort`; inputs under the limit
    /// are sorted in process and never persisted.
    pub fn new(dir: &Path, in_memory_sort_limit: u64) -> Result<Self> {
        Self::with_strategies(
            dir,
            in_memory_sort_limit,
            Arc::new(ExternalSort::default()),
            Arc::new(crate::sort::InMemorySort),
        )
    }

    pub fn with_strategies(
        dir: &Path,
        in_memory_sort_limit: u64,
        persisting_sort: Arc<dyn SortStrategy>,
        streaming_sort: Arc<dyn SortStrategy>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::io(format!("failed to create {}: {e}", dir.display())))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            in_memory_sort_limit,
            persisting_sort,
            streaming_sort,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn base_path(&self, key: &str, kind: RecordKind) -> PathBuf {
        self.dir.join(format!("{key}_{}.tsv.gz", kind.suffix()))
    }

    #[must_use]
    pub fn sorted_path(&self, key: &str, kind: RecordKind, signature: &str) -> PathBuf {
        self.dir
            .join(format!("{key}_{}_{signature}.tsv.gz", kind.suffix()))
    }

    #[must_use]
    pub fn has_base(&self, key: &str, kind: RecordKind) -> bool {
        self.base_path(key, kind).is_file()
    }

    /// Builds the base artifact once. `produce` runs only when the artifact
    /// is absent; returns whether this call published it.
    pub fn build<F, I>(&self, key: &str, kind: RecordKind, produce: F) -> Result<bool>
    where
        F: FnOnce() -> Result<I>,
        I: IntoIterator<Item = String>,
    {
        let canonical = self.base_path(key, kind);
        if canonical.is_file() {
            debug!(artifact = %canonical.display(), "flat-file index present");
            return Ok(false);
        }
        let started = Instant::now();
        let lines = produce()?;
        let tmp = temp_path_for(&canonical)?;
        let written = write_gzip_lines(&tmp, lines).inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })?;
        let published = publish_no_clobber(&tmp, &canonical)?;
        info!(
            artifact = %canonical.display(),
            lines = written,
            published,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "flat-file index built"
        );
        Ok(published)
    }

    /// Lines of the (key, kind) artifact in `sort` order.
    pub fn open(&self, key: &str, kind: RecordKind, sort: &SortSpec) -> Result<LineSource> {
        let base = self.base_path(key, kind);
        if !base.is_file() {
            return Err(Error::not_found(format!(
                "index file not found: {}",
                base.display()
            )));
        }
        if sort.is_empty() {
            return LineSource::gzip(&base);
        }
        let keys = kind.table().resolve(sort)?;
        let signature = signature_of(&keys);
        let sorted = self.sorted_path(key, kind, &signature);
        if sorted.is_file() {
            debug!(artifact = %sorted.display(), "sorted index present");
            return LineSource::gzip(&sorted);
        }
        let size = std::fs::metadata(&base)?.len();
        let started = Instant::now();
        if size < self.in_memory_sort_limit {
            debug!(
                artifact = %base.display(),
                size,
                signature = %signature,
                strategy = self.streaming_sort.name(),
                "sorting without persisting"
            );
            return self.streaming_sort.sort_lines(&base, &keys);
        }
        let tmp = temp_path_for(&sorted)?;
        self.persisting_sort
            .sort_to_file(&base, &keys, &tmp)
            .inspect_err(|_| {
                let _ = std::fs::remove_file(&tmp);
            })?;
        publish_no_clobber(&tmp, &sorted)?;
        info!(
            artifact = %sorted.display(),
            size,
            strategy = self.persisting_sort.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "sorted index persisted"
        );
        LineSource::gzip(&sorted)
    }
}

fn write_gzip_lines<I>(path: &Path, lines: I) -> Result<u64>
where
    I: IntoIterator<Item = String>,
{
    let file = File::create(path)
        .map_err(|e| Error::io(format!("failed to create {}: {e}", path.display())))?;
    let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut count = 0_u64;
    for line in lines {
        enc.write_all(line.as_bytes())?;
        enc.write_all(b"\n")?;
        count += 1;
    }
    let mut inner = enc.finish()?;
    inner.flush()?;
    inner
        .into_inner()
        .map_err(|e| Error::io(e.to_string()))?
        .sync_all()?;
    Ok(count)
}
