// SPDX-License-Identifier: Apache-2.0

//! Features answered by the external search service. Requests are boolean
//! queries scoped to one object: `must` holds the scope, region bounds and
//! one `should` group per filter token.

use metagenome_core::{Error, Result};
use metagenome_model::{Feature, FeatureTypeCounts, ObjectMetadata, Page, SortSpec};
use metagenome_store::SearchService;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::FeatureIndexBackend;
use crate::filter::tokenize;
use crate::request::{PageRequest, RegionRequest};
use crate::sql::{feature_column, SearchFields};

const AGGREGATION: &str = "by_field";
const TYPE_BUCKETS: u64 = 1000;

pub struct SearchServiceBackend {
    service: Arc<dyn SearchService>,
    fields: SearchFields,
}

fn scope(metadata: &ObjectMetadata) -> Value {
    json!({"term": {"object_ref": metadata.reference.as_str()}})
}

fn token_clause(token: &str, fields: &SearchFields) -> Value {
    let mut should: Vec<Value> = fields
        .keyword()
        .iter()
        .map(|k| json!({"term": {*k: token}}))
        .collect();
    should.extend(fields.text().iter().map(|t| json!({"match": {*t: token}})));
    json!({"bool": {"should": should, "minimum_should_match": 1}})
}

fn sort_clause(sort: &SortSpec) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    let mut has_id = false;
    for key in sort.keys() {
        let column = feature_column(&key.column)?;
        has_id |= column == "id";
        out.push(json!({column: {"order": if key.ascending { "asc" } else { "desc" }}}));
    }
    if !has_id {
        out.push(json!({"id": {"order": "asc"}}));
    }
    Ok(out)
}

fn paged(must: Vec<Value>, sort: &SortSpec, start: u64, limit: u64) -> Result<Value> {
    Ok(json!({
        "query": {"bool": {"must": must}},
        "sort": sort_clause(sort)?,
        "from": start,
        "size": limit,
        "track_total_hits": true
    }))
}

fn aggregation(must: Vec<Value>, field: &str, buckets: u64) -> Value {
    json!({
        "query": {"bool": {"must": must}},
        "size": 0,
        "aggs": {AGGREGATION: {"terms": {"field": field, "size": buckets}}}
    })
}

fn malformed(what: &str) -> Error {
    Error::backend_unavailable(format!("search service result has no {what}"))
}

fn result_count(result: &Value) -> Result<u64> {
    result
        .get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("count"))
}

fn result_features(result: &Value) -> Result<Vec<Feature>> {
    let hits = result
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("hits"))?;
    hits.iter()
        .map(|hit| {
            let doc = hit.get("doc").unwrap_or(hit);
            serde_json::from_value(doc.clone()).map_err(|e| {
                Error::new(
                    metagenome_core::ErrorCode::Parse,
                    format!("search hit is not a feature: {e}"),
                )
            })
        })
        .collect()
}

fn result_buckets(result: &Value) -> Result<BTreeMap<String, u64>> {
    let buckets = result
        .pointer(&format!("/aggregations/{AGGREGATION}/buckets"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("aggregation buckets"))?;
    let mut out = BTreeMap::new();
    for bucket in buckets {
        let key = match bucket.get("key") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return Err(malformed("bucket key")),
        };
        let count = bucket
            .get("doc_count")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("bucket doc_count"))?;
        out.insert(key, count);
    }
    Ok(out)
}

impl SearchServiceBackend {
    #[must_use]
    pub fn new(service: Arc<dyn SearchService>, fields: SearchFields) -> Self {
        Self { service, fields }
    }

    fn page(&self, request: &Value, token: &str, start: u64) -> Result<Page<Feature>> {
        let result = self.service.search(request, token)?;
        Ok(Page {
            items: result_features(&result)?,
            num_found: result_count(&result)?,
            start,
        })
    }
}

impl FeatureIndexBackend for SearchServiceBackend {
    fn name(&self) -> &'static str {
        "search"
    }

    /// The service maintains its own index.
    fn ensure_ready(&self, _metadata: &ObjectMetadata, _token: &str) -> Result<bool> {
        Ok(true)
    }

    fn query(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        request: &PageRequest,
    ) -> Result<Page<Feature>> {
        let mut must = vec![scope(metadata)];
        must.extend(
            tokenize(&request.query)
                .iter()
                .map(|t| token_clause(t, &self.fields)),
        );
        let body = paged(must, &request.sort, request.start, request.limit)?;
        self.page(&body, token, request.start)
    }

    fn query_region(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        request: &RegionRequest,
    ) -> Result<Page<Feature>> {
        let must = vec![
            scope(metadata),
            json!({"term": {"contig_id": request.contig_id}}),
            json!({"range": {"starts": {"lte": request.region_stop()}}}),
            json!({"range": {"stops": {"gte": request.region_start}}}),
        ];
        let body = paged(must, &request.sort, request.start, request.limit)?;
        self.page(&body, token, request.start)
    }

    fn counts_by_contig(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        limit: u64,
    ) -> Result<BTreeMap<String, u64>> {
        let body = aggregation(vec![scope(metadata)], "contig_id", limit);
        result_buckets(&self.service.search(&body, token)?)
    }

    fn count_for_contig(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        contig_id: &str,
    ) -> Result<u64> {
        let body = json!({
            "query": {"bool": {"must": [scope(metadata), {"term": {"contig_id": contig_id}}]}},
            "size": 0,
            "track_total_hits": true
        });
        result_count(&self.service.search(&body, token)?)
    }

    fn counts_by_type(&self, metadata: &ObjectMetadata, token: &str) -> Result<FeatureTypeCounts> {
        let body = aggregation(vec![scope(metadata)], "type", TYPE_BUCKETS);
        result_buckets(&self.service.search(&body, token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_token_becomes_a_should_group() {
        let clause = token_clause("kinase", &SearchFields::default());
        let should = clause["bool"]["should"].as_array().expect("should");
        assert_eq!(should.len(), 4);
        assert_eq!(should[0], json!({"term": {"id": "kinase"}}));
        assert_eq!(should[2], json!({"match": {"functions": "kinase"}}));
    }

    #[test]
    fn sort_keeps_id_last_and_rejects_unknown() {
        let sort = SortSpec::new(vec![metagenome_model::SortKey::desc("contig_ids")]);
        assert_eq!(
            Value::Array(sort_clause(&sort).expect("sort")),
            json!([{"contig_id": {"order": "desc"}}, {"id": {"order": "asc"}}])
        );
        let bad = SortSpec::new(vec![metagenome_model::SortKey::asc("weight")]);
        assert!(sort_clause(&bad).is_err());
    }

    #[test]
    fn buckets_require_counts() {
        let ok = json!({"aggregations": {"by_field": {"buckets": [{"key": "c1", "doc_count": 3}]}}});
        assert_eq!(result_buckets(&ok).expect("buckets").get("c1"), Some(&3));
        let bad = json!({"aggregations": {"by_field": {"buckets": [{"key": "c1"}]}}});
        assert!(result_buckets(&bad).is_err());
        assert!(result_buckets(&json!({})).is_err());
    }

    #[test]
    fn hits_may_be_wrapped() {
        let result = json!({"count": 2, "hits": [
            {"id": "a", "type": "gene"},
            {"doc": {"id": "b", "type": "CDS"}}
        ]});
        let features = result_features(&result).expect("features");
        assert_eq!(features[1].id, "b");
    }
}
