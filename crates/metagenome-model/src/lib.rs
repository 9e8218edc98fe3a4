// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Metagenome model SSOT: identifiers, record shapes, sort specifications and
//! result pages shared by the indexers, the query layer and the facade.

mod page;
mod records;
mod reference;
mod sort;

pub use page::{
    BinPage, ContigInBinPage, ContigPage, FeaturePage, FeatureTypeCounts, Page, RegionPage,
};
pub use records::{
    Bin, ContigInBin, ContigSummary, Feature, FeatureData, FeatureSpan, Location, LocationView,
    Strand,
};
pub use reference::{
    encode_bin_key, Fingerprint, ObjectMetadata, ParseError, Reference,
    FINGERPRINT_MAX_LEN, REFERENCE_MAX_LEN,
};
pub use sort::{SortKey, SortSpec};

pub const CRATE_NAME: &str = "metagenome-model";

pub const DEFAULT_LIMIT: u64 = 50;
