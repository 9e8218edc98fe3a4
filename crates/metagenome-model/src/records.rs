// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Strand {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
}

impl Strand {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        match raw {
            "+" => Ok(Self::Plus),
            "-" => Ok(Self::Minus),
            _ => Err(ParseError::InvalidFormat("strand must be one of '+', '-'")),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
        }
    }
}

impl Display for Strand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One location segment. Serialized as the payload tuple
/// `[contig_id, start, strand, length]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, i64, Strand, i64)", into = "(String, i64, Strand, i64)")]
pub struct Location {
    pub contig_id: String,
    pub start: i64,
    pub strand: Strand,
    pub length: i64,
}

impl From<(String, i64, Strand, i64)> for Location {
    fn from((contig_id, start, strand, length): (String, i64, Strand, i64)) -> Self {
        Self {
            contig_id,
            start,
            strand,
            length,
        }
    }
}

impl From<Location> for (String, i64, Strand, i64) {
    fn from(value: Location) -> Self {
        (value.contig_id, value.start, value.strand, value.length)
    }
}

impl Location {
    /// Positional span on the contig: `[start, start+length]` on `+`,
    /// `[start-length, start]` on `-`. Saturates at the `i64` bounds.
    #[must_use]
    pub fn span(&self) -> (i64, i64) {
        match self.strand {
            Strand::Plus => (self.start, self.stop()),
            Strand::Minus => (self.stop(), self.start),
        }
    }

    fn stop(&self) -> i64 {
        match self.strand {
            Strand::Plus => self.start.saturating_add(self.length),
            Strand::Minus => self.start.saturating_sub(self.length),
        }
    }

    #[must_use]
    pub fn view(&self) -> LocationView {
        let stop = self.stop();
        LocationView {
            contig_id: self.contig_id.clone(),
            start: self.start,
            stop,
            strand: self.strand,
            length: self.length,
        }
    }
}

/// Values derived from a feature's first location segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpan {
    pub contig_id: String,
    pub strand: Strand,
    pub start: i64,
    pub stop: i64,
    pub length: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(default)]
    pub location: Vec<Location>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub functional_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dna_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dna_sequence_length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ontology_terms: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_gene: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    /// Payload fields this layer does not interpret; kept so the stored
    /// document is the full record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// `None` when the feature has no location segment.
    #[must_use]
    pub fn span(&self) -> Option<FeatureSpan> {
        let first = self.location.first()?;
        let (start, stop) = first.span();
        Some(FeatureSpan {
            contig_id: first.contig_id.clone(),
            strand: first.strand,
            start,
            stop,
            length: first.length,
        })
    }

    #[must_use]
    pub fn first_function(&self) -> &str {
        self.functions.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationView {
    pub contig_id: String,
    pub start: i64,
    pub stop: i64,
    pub strand: Strand,
    pub length: i64,
}

/// Returned shape of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureData {
    pub feature_id: String,
    pub feature_type: String,
    pub location: Vec<LocationView>,
    pub global_location: Option<LocationView>,
    pub dna_sequence: Option<String>,
    pub parent_gene: Option<String>,
    pub size: Option<i64>,
    pub function: String,
    pub functional_descriptions: Vec<String>,
    pub ontology_terms: Value,
    pub aliases: Option<Value>,
    pub warnings: Option<Vec<String>>,
}

impl From<Feature> for FeatureData {
    fn from(feature: Feature) -> Self {
        let location: Vec<LocationView> = feature.location.iter().map(Location::view).collect();
        let function = feature.first_function().to_string();
        Self {
            feature_id: feature.id,
            feature_type: feature.feature_type,
            global_location: location.first().cloned(),
            location,
            dna_sequence: feature.dna_sequence,
            parent_gene: feature.parent_gene,
            size: feature.dna_sequence_length,
            function,
            functional_descriptions: feature.functional_descriptions,
            ontology_terms: feature
                .ontology_terms
                .unwrap_or_else(|| Value::Object(Map::new())),
            aliases: feature.aliases,
            warnings: feature.warnings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub bin_id: String,
    pub n_contigs: Option<i64>,
    pub sum_contig_len: Option<i64>,
    pub gc: Option<f64>,
    pub cov: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContigInBin {
    pub contig_id: String,
    pub len: i64,
    pub gc: f64,
    pub cov: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigSummary {
    pub contig_id: String,
    pub length: i64,
    pub feature_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(strand: &str) -> Feature {
        serde_json::from_value(json!({
            "id": "g1",
            "type": "CDS",
            "location": [["contig_7", 500, strand, 120]],
            "functions": ["hypothetical protein"],
            "dna_sequence_length": 120,
            "md5": "abc"
        }))
        .expect("feature")
    }

    #[test]
    fn span_follows_strand() {
        let plus = feature("+").span().expect("span");
        assert_eq!((plus.start, plus.stop), (500, 620));
        let minus = feature("-").span().expect("span");
        assert_eq!((minus.start, minus.stop), (380, 500));
        assert_eq!(minus.contig_id, "contig_7");
    }

    #[test]
    fn span_saturates_at_coordinate_bounds() {
        let far = Location::from(("c".to_string(), i64::MAX - 1, Strand::Plus, 10));
        assert_eq!(far.span(), (i64::MAX - 1, i64::MAX));
        assert_eq!(far.view().stop, i64::MAX);
        let low = Location::from(("c".to_string(), i64::MIN + 1, Strand::Minus, i64::MAX));
        assert_eq!(low.span(), (i64::MIN, i64::MIN + 1));
        let negative = Location::from(("c".to_string(), 5, Strand::Plus, i64::MIN));
        assert_eq!(negative.span().1, i64::MIN + 5);
    }

    #[test]
    fn unknown_payload_fields_survive_reserialization() {
        let f = feature("+");
        assert_eq!(f.extra.get("md5"), Some(&json!("abc")));
        let back = serde_json::to_value(&f).expect("json");
        assert_eq!(back["location"], json!([["contig_7", 500, "+", 120]]));
        assert_eq!(back["md5"], json!("abc"));
    }

    #[test]
    fn feature_view_uses_first_segment_and_function() {
        let data = FeatureData::from(feature("+"));
        assert_eq!(data.function, "hypothetical protein");
        assert_eq!(data.size, Some(120));
        let global = data.global_location.expect("global");
        assert_eq!((global.start, global.stop), (500, 620));
        assert_eq!(data.ontology_terms, json!({}));
    }

    #[test]
    fn missing_location_has_no_span() {
        let f: Feature = serde_json::from_value(json!({"id": "x", "type": "gene"})).expect("f");
        assert!(f.span().is_none());
        assert_eq!(f.first_function(), "");
    }
}
