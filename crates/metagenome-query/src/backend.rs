// SPDX-License-Identifier: Apache-2.0

use metagenome_core::Result;
use metagenome_model::{Feature, FeatureTypeCounts, ObjectMetadata, Page};
use std::collections::BTreeMap;

use crate::request::{PageRequest, RegionRequest};

/// One way of answering feature queries. Exactly one realization serves a
/// deployment. Query operations expect `ensure_ready` to have returned
/// `true` for the object.
pub trait FeatureIndexBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `true` when the object's features are queryable now; otherwise a
    /// build is under way and the caller reports `indexing`.
    fn ensure_ready(&self, metadata: &ObjectMetadata, token: &str) -> Result<bool>;

    fn query(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        request: &PageRequest,
    ) -> Result<Page<Feature>>;

    fn query_region(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        request: &RegionRequest,
    ) -> Result<Page<Feature>>;

    /// Feature counts for at most `limit` contigs.
    fn counts_by_contig(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        limit: u64,
    ) -> Result<BTreeMap<String, u64>>;

    fn count_for_contig(&self, metadata: &ObjectMetadata, token: &str, contig_id: &str)
        -> Result<u64>;

    fn counts_by_type(&self, metadata: &ObjectMetadata, token: &str) -> Result<FeatureTypeCounts>;
}
