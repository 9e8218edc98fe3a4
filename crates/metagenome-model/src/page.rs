// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Bin, ContigInBin, ContigSummary, FeatureData};

/// Result window of one scan; `num_found` is approximate when a caller
/// supplied a known total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub num_found: u64,
    pub start: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn empty(start: u64) -> Self {
        Self {
            items: Vec::new(),
            num_found: 0,
            start,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            num_found: self.num_found,
            start: self.start,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinPage {
    pub bins: Vec<Bin>,
    pub num_found: u64,
    pub start: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContigInBinPage {
    pub contigs: Vec<ContigInBin>,
    pub num_found: u64,
    pub start: u64,
    pub query: String,
    pub bin_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePage {
    pub features: Vec<FeatureData>,
    pub num_found: u64,
    pub start: u64,
    pub query: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indexing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPage {
    pub features: Vec<FeatureData>,
    pub num_found: u64,
    pub start: u64,
    pub contig_id: String,
    pub region_start: i64,
    pub region_length: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub indexing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigPage {
    pub contigs: Vec<ContigSummary>,
    pub num_found: u64,
    pub start: u64,
}

impl ContigPage {
    #[must_use]
    pub fn feature_count_sum(&self) -> u64 {
        self.contigs.iter().map(|c| c.feature_count).sum()
    }
}

pub type FeatureTypeCounts = BTreeMap<String, u64>;
