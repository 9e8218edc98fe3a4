// SPDX-License-Identifier: Apache-2.0

use metagenome_core::Result;
use metagenome_index::encode::feature_line;
use metagenome_index::payload::fetch_features;
use metagenome_index::{BuildPool, FlatFileIndexer, RecordKind};
use metagenome_model::{Feature, FeatureTypeCounts, ObjectMetadata, Page, SortSpec};
use metagenome_store::BlobStore;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::FeatureIndexBackend;
use crate::filter::Filter;
use crate::paginate::{display_fields, scan_page};
use crate::request::{PageRequest, RegionRequest};
use crate::unpack::unpack_feature;

const CONTIG_FIELD: usize = 3;
const TYPE_FIELD: usize = 2;
const STARTS_FIELD: usize = 5;
const STOPS_FIELD: usize = 6;

/// Features served from a gzip TSV artifact keyed by the object fingerprint.
pub struct FlatFileFeatureBackend {
    files: Arc<FlatFileIndexer>,
    blobs: Arc<dyn BlobStore>,
    pool: Arc<BuildPool>,
}

fn field(line: &str, index: usize) -> Option<&str> {
    line.split('\t').nth(index)
}

fn region_fields(line: &str) -> Option<(&str, i64, i64)> {
    let mut parts = line.split('\t');
    let contig = parts.nth(CONTIG_FIELD)?;
    let starts = parts.nth(STARTS_FIELD - CONTIG_FIELD - 1)?.parse().ok()?;
    let stops = parts.next()?.parse().ok()?;
    Some((contig, starts, stops))
}

/// Builds the feature lines; the first record of a duplicated id wins.
fn feature_lines(features: Vec<Feature>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(features.len());
    for (ordinal, feature) in features.iter().enumerate() {
        if !seen.insert(feature.id.as_str()) {
            warn!(feature_id = %feature.id, "duplicate feature id skipped");
            continue;
        }
        match feature_line(ordinal as u64, feature)? {
            Some(line) => lines.push(line),
            None => warn!(feature_id = %feature.id, "feature without location skipped"),
        }
    }
    Ok(lines)
}

impl FlatFileFeatureBackend {
    #[must_use]
    pub fn new(files: Arc<FlatFileIndexer>, blobs: Arc<dyn BlobStore>, pool: Arc<BuildPool>) -> Self {
        Self { files, blobs, pool }
    }

    fn key(metadata: &ObjectMetadata) -> String {
        metadata.fingerprint.to_string()
    }

    fn count_by_field(
        &self,
        metadata: &ObjectMetadata,
        index: usize,
        mut keep: impl FnMut(&str) -> bool,
    ) -> Result<BTreeMap<String, u64>> {
        let lines = self
            .files
            .open(&Self::key(metadata), RecordKind::Features, &SortSpec::default())?;
        let mut counts = BTreeMap::new();
        for line in lines {
            let line = line?;
            if !keep(&line) {
                continue;
            }
            if let Some(value) = field(&line, index) {
                *counts.entry(value.to_string()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

impl FeatureIndexBackend for FlatFileFeatureBackend {
    fn name(&self) -> &'static str {
        "flatfile"
    }

    fn ensure_ready(&self, metadata: &ObjectMetadata, token: &str) -> Result<bool> {
        let key = Self::key(metadata);
        if self.files.has_base(&key, RecordKind::Features) {
            return Ok(true);
        }
        let files = Arc::clone(&self.files);
        let blobs = Arc::clone(&self.blobs);
        let job_metadata = metadata.clone();
        let job_token = token.to_string();
        let job_key = key.clone();
        let submitted = self.pool.submit(&format!("feats:{key}"), move || {
            files
                .build(&job_key, RecordKind::Features, || {
                    feature_lines(fetch_features(blobs.as_ref(), &job_metadata, &job_token)?)
                })
                .map(|_| ())
        });
        debug!(reference = %metadata.reference, submitted, "feature artifact build requested");
        Ok(false)
    }

    fn query(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        request: &PageRequest,
    ) -> Result<Page<Feature>> {
        RecordKind::Features.table().resolve(&request.sort)?;
        let filter = Filter::parse(&request.query);
        let lines = self
            .files
            .open(&Self::key(metadata), RecordKind::Features, &request.sort)?;
        scan_page(
            lines,
            &request.window(),
            |line| filter.matches(display_fields(line)),
            unpack_feature,
        )
    }

    fn query_region(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        request: &RegionRequest,
    ) -> Result<Page<Feature>> {
        let lines = self
            .files
            .open(&Self::key(metadata), RecordKind::Features, &request.sort)?;
        scan_page(
            lines,
            &request.window(),
            |line| {
                region_fields(line).is_some_and(|(contig, starts, stops)| {
                    contig == request.contig_id && request.overlaps(starts, stops)
                })
            },
            unpack_feature,
        )
    }

    fn counts_by_contig(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        limit: u64,
    ) -> Result<BTreeMap<String, u64>> {
        let counts = self.count_by_field(metadata, CONTIG_FIELD, |_| true)?;
        Ok(counts
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    fn count_for_contig(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        contig_id: &str,
    ) -> Result<u64> {
        let counts = self.count_by_field(metadata, CONTIG_FIELD, |line| {
            field(line, CONTIG_FIELD) == Some(contig_id)
        })?;
        Ok(counts.get(contig_id).copied().unwrap_or(0))
    }

    fn counts_by_type(&self, metadata: &ObjectMetadata, _token: &str) -> Result<FeatureTypeCounts> {
        self.count_by_field(metadata, TYPE_FIELD, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_fields_read_contig_and_span() {
        let line = "4\tg1\tCDS\tc9\t-\t60\t100\t40\tkinase\t{}";
        assert_eq!(region_fields(line), Some(("c9", 60, 100)));
        assert_eq!(region_fields("4\tg1"), None);
    }

    #[test]
    fn duplicate_ids_keep_the_first_line() {
        let features: Vec<Feature> = serde_json::from_value(serde_json::json!([
            {"id": "a", "type": "gene", "location": [["c1", 1, "+", 5]]},
            {"id": "a", "type": "CDS", "location": [["c2", 1, "+", 5]]},
            {"id": "b", "type": "gene"}
        ]))
        .expect("features");
        let lines = feature_lines(features).expect("lines");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("0\ta\tgene\tc1\t"));
    }
}
