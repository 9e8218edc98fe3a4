// SPDX-License-Identifier: Apache-2.0

//! Contig summaries: lengths from the object, feature counts from the
//! feature backend. Composite pages are kept in the result cache.

use metagenome_core::canonical::stable_json_hash_hex;
use metagenome_core::{Error, Result};
use metagenome_model::{ContigPage, ContigSummary, ObjectMetadata, SortSpec, DEFAULT_LIMIT};
use metagenome_store::{ObjectStore, ResultCache};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::backend::FeatureIndexBackend;

pub const FEATURE_COUNT_FLOOR: u64 = 4000;
pub const FEATURE_COUNT_CEILING: u64 = 8000;

const CONTIG_SORT_COLUMNS: [&str; 3] = ["contig_id", "length", "feature_count"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContigSortField {
    ContigId,
    Length,
    FeatureCount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigsRequest {
    #[serde(default)]
    pub start: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub sort: SortSpec,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl Default for ContigsRequest {
    fn default() -> Self {
        Self {
            start: 0,
            limit: DEFAULT_LIMIT,
            sort: SortSpec::default(),
        }
    }
}

/// First sort key only; default `contig_id` ascending.
pub fn contig_sort(sort: &SortSpec) -> Result<(ContigSortField, bool)> {
    let Some(key) = sort.first() else {
        return Ok((ContigSortField::ContigId, true));
    };
    let field = match key.column.as_str() {
        "contig_id" => ContigSortField::ContigId,
        "length" => ContigSortField::Length,
        "feature_count" => ContigSortField::FeatureCount,
        other => {
            return Err(Error::validation(format!(
                "Unknown column name '{other}' for contigs, please use one of [{}]",
                CONTIG_SORT_COLUMNS.join(", ")
            )))
        }
    };
    Ok((field, key.ascending))
}

/// How many contigs get a feature count for a window.
#[must_use]
pub fn feature_count_limit(start: u64, limit: u64) -> u64 {
    start
        .saturating_add(limit)
        .max(FEATURE_COUNT_FLOOR)
        .min(FEATURE_COUNT_CEILING)
}

/// `(contig_id, length)` pairs in object order.
pub fn contig_lengths(
    store: &dyn ObjectStore,
    metadata: &ObjectMetadata,
    token: &str,
) -> Result<Vec<(String, i64)>> {
    let data = store.get_fields(
        &metadata.reference,
        token,
        &["contig_ids".to_string(), "contig_lengths".to_string()],
    )?;
    let ids = data
        .get("contig_ids")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::validation(format!("object {} has no contig_ids", metadata.reference)))?;
    let lengths = data
        .get("contig_lengths")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::validation(format!("object {} has no contig_lengths", metadata.reference))
        })?;
    if ids.len() != lengths.len() {
        return Err(Error::validation(format!(
            "contig ids (size: {}) and contig lengths (size: {}) sizes do not match.",
            ids.len(),
            lengths.len()
        )));
    }
    ids.iter()
        .zip(lengths)
        .map(|(id, len)| {
            let id = id
                .as_str()
                .ok_or_else(|| Error::validation(format!("contig id {id} is not a string")))?;
            let len = len
                .as_i64()
                .ok_or_else(|| Error::validation(format!("contig length {len} is not an integer")))?;
            Ok((id.to_string(), len))
        })
        .collect()
}

fn sort_summaries(contigs: &mut [ContigSummary], field: ContigSortField, ascending: bool) {
    contigs.sort_by(|a, b| {
        let ord = match field {
            ContigSortField::ContigId => a
                .contig_id
                .cmp(&b.contig_id)
                .then(a.length.cmp(&b.length)),
            ContigSortField::Length => a.length.cmp(&b.length).then(a.contig_id.cmp(&b.contig_id)),
            ContigSortField::FeatureCount => a
                .feature_count
                .cmp(&b.feature_count)
                .then(a.contig_id.cmp(&b.contig_id)),
        };
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

fn page_of(
    mut contigs: Vec<ContigSummary>,
    request: &ContigsRequest,
    field: ContigSortField,
    ascending: bool,
) -> ContigPage {
    let num_found = contigs.len() as u64;
    sort_summaries(&mut contigs, field, ascending);
    let start = usize::try_from(request.start).unwrap_or(usize::MAX);
    let limit = usize::try_from(request.limit).unwrap_or(usize::MAX);
    let items = if start >= contigs.len() {
        Vec::new()
    } else {
        contigs.into_iter().skip(start).take(limit).collect()
    };
    ContigPage {
        contigs: items,
        num_found,
        start: request.start,
    }
}

/// Result-cache key of a composite page.
pub fn cache_key(metadata: &ObjectMetadata, request: &ContigsRequest) -> Result<String> {
    Ok(stable_json_hash_hex(&json!({
        "kind": "contigs",
        "reference": metadata.reference.as_str(),
        "start": request.start,
        "limit": request.limit,
        "sort": request.sort,
    }))?)
}

fn cached_page(cache: &dyn ResultCache, key: &str, token: &str) -> Option<ContigPage> {
    let bytes = match cache.get(key, token) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "result cache read failed");
            return None;
        }
    };
    match serde_json::from_slice::<ContigPage>(&bytes) {
        Ok(page) if page.feature_count_sum() > 0 => {
            debug!(key, "contig page served from result cache");
            Some(page)
        }
        Ok(_) => {
            debug!(key, "cached contig page has no feature counts; recomputing");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "cached contig page is unreadable; recomputing");
            None
        }
    }
}

pub struct ContigComposite<'a> {
    pub store: &'a dyn ObjectStore,
    pub backend: &'a dyn FeatureIndexBackend,
    pub cache: &'a dyn ResultCache,
}

impl ContigComposite<'_> {
    /// Sorted page of contig summaries. Pages computed while the feature
    /// index is still building carry zero counts and are not cached.
    pub fn search_contigs(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        request: &ContigsRequest,
    ) -> Result<ContigPage> {
        let (field, ascending) = contig_sort(&request.sort)?;
        let key = cache_key(metadata, request)?;
        if let Some(page) = cached_page(self.cache, &key, token) {
            return Ok(page);
        }
        let ready = self.backend.ensure_ready(metadata, token)?;
        let lengths = contig_lengths(self.store, metadata, token)?;
        let counts = if ready {
            self.backend.counts_by_contig(
                metadata,
                token,
                feature_count_limit(request.start, request.limit),
            )?
        } else {
            BTreeMap::new()
        };
        let contigs = lengths
            .into_iter()
            .map(|(contig_id, length)| ContigSummary {
                feature_count: counts.get(&contig_id).copied().unwrap_or(0),
                contig_id,
                length,
            })
            .collect();
        let page = page_of(contigs, request, field, ascending);
        if ready {
            let bytes = serde_json::to_vec(&page)?;
            if let Err(e) = self.cache.put(&key, token, &bytes) {
                warn!(key = %key, error = %e, "result cache write failed");
            }
        }
        Ok(page)
    }

    /// Length and feature count of one contig; the count is zero while the
    /// feature index is building.
    pub fn contig_info(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        contig_id: &str,
    ) -> Result<ContigSummary> {
        let length = contig_lengths(self.store, metadata, token)?
            .into_iter()
            .find(|(id, _)| id == contig_id)
            .map(|(_, len)| len)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "No contig with ID: \"{contig_id}\" found in {}.",
                    metadata.reference
                ))
            })?;
        let feature_count = if self.backend.ensure_ready(metadata, token)? {
            self.backend.count_for_contig(metadata, token, contig_id)?
        } else {
            0
        };
        Ok(ContigSummary {
            contig_id: contig_id.to_string(),
            length,
            feature_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagenome_model::SortKey;

    fn summary(id: &str, length: i64, feature_count: u64) -> ContigSummary {
        ContigSummary {
            contig_id: id.to_string(),
            length,
            feature_count,
        }
    }

    #[test]
    fn feature_count_limit_is_clamped() {
        assert_eq!(feature_count_limit(0, 50), 4000);
        assert_eq!(feature_count_limit(5000, 50), 5050);
        assert_eq!(feature_count_limit(9000, 50), 8000);
    }

    #[test]
    fn sort_fields_and_directions() {
        let mut c = vec![summary("b", 10, 5), summary("a", 30, 0), summary("c", 20, 9)];
        sort_summaries(&mut c, ContigSortField::FeatureCount, false);
        assert_eq!(c[0].contig_id, "c");
        sort_summaries(&mut c, ContigSortField::Length, true);
        assert_eq!(c[0].contig_id, "b");
        sort_summaries(&mut c, ContigSortField::ContigId, false);
        assert_eq!(c[0].contig_id, "c");
    }

    #[test]
    fn unknown_contig_sort_is_rejected() {
        let err = contig_sort(&SortSpec::new(vec![SortKey::asc("gc")])).expect_err("gc");
        assert!(err.message.contains("contig_id, length, feature_count"));
        assert_eq!(
            contig_sort(&SortSpec::default()).expect("default"),
            (ContigSortField::ContigId, true)
        );
    }

    #[test]
    fn start_past_the_end_is_an_empty_page() {
        let request = ContigsRequest {
            start: 5,
            limit: 10,
            sort: SortSpec::default(),
        };
        let page = page_of(vec![summary("a", 1, 1)], &request, ContigSortField::ContigId, true);
        assert!(page.contigs.is_empty());
        assert_eq!(page.num_found, 1);
    }
}
