// SPDX-License-Identifier: Apache-2.0

use metagenome_model::{SortSpec, DEFAULT_LIMIT};
use serde::{Deserialize, Serialize};

/// Filter text, sort and window of one paged query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub sort: SortSpec,
    #[serde(default)]
    pub start: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Total from an earlier full scan; lets the scan stop at the window end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_total: Option<u64>,
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            sort: SortSpec::default(),
            start: 0,
            limit: DEFAULT_LIMIT,
            known_total: None,
        }
    }
}

impl PageRequest {
    #[must_use]
    pub fn window(&self) -> Window {
        Window {
            start: self.start,
            limit: self.limit,
            known_total: self.known_total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub limit: u64,
    pub known_total: Option<u64>,
}

impl Window {
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.limit)
    }
}

/// Features on `contig_id` overlapping `[region_start, region_start + region_length]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRequest {
    pub contig_id: String,
    pub region_start: i64,
    pub region_length: i64,
    #[serde(default)]
    pub start: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub sort: SortSpec,
}

impl RegionRequest {
    #[must_use]
    pub fn region_stop(&self) -> i64 {
        self.region_start.saturating_add(self.region_length)
    }

    /// True overlap of `[start, stop]` with the region, bounds inclusive.
    #[must_use]
    pub fn overlaps(&self, start: i64, stop: i64) -> bool {
        start <= self.region_stop() && stop >= self.region_start
    }

    #[must_use]
    pub fn window(&self) -> Window {
        Window {
            start: self.start,
            limit: self.limit,
            known_total: None,
        }
    }
}
