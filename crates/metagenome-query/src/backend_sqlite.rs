// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_index::sqlite::open_readonly;
use metagenome_index::EmbeddedIndexer;
use metagenome_model::{Feature, FeatureTypeCounts, ObjectMetadata, Page};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::backend::FeatureIndexBackend;
use crate::request::{PageRequest, RegionRequest};
use crate::sql::{self, SearchFields};

/// Features served from the per-reference SQLite store.
pub struct SqliteBackend {
    indexer: EmbeddedIndexer,
    fields: SearchFields,
}

impl SqliteBackend {
    #[must_use]
    pub fn new(indexer: EmbeddedIndexer, fields: SearchFields) -> Self {
        Self { indexer, fields }
    }

    #[must_use]
    pub fn indexer(&self) -> &EmbeddedIndexer {
        &self.indexer
    }

    fn connect(&self, metadata: &ObjectMetadata) -> Result<Connection> {
        let path = self.indexer.store_path(&metadata.reference);
        if !path.is_file() {
            return Err(Error::not_found(format!(
                "feature store for {} is not built",
                metadata.reference
            )));
        }
        open_readonly(&path)
    }
}

impl FeatureIndexBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_ready(&self, metadata: &ObjectMetadata, token: &str) -> Result<bool> {
        self.indexer.ensure_index(metadata, token)
    }

    fn query(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        request: &PageRequest,
    ) -> Result<Page<Feature>> {
        let started = Instant::now();
        let conn = self.connect(metadata)?;
        let page = sql::search_features(
            &conn,
            &self.fields,
            &request.query,
            &request.sort,
            request.start,
            request.limit,
        )?;
        debug!(
            reference = %metadata.reference,
            num_found = page.num_found,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "feature query"
        );
        Ok(page)
    }

    fn query_region(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        request: &RegionRequest,
    ) -> Result<Page<Feature>> {
        let conn = self.connect(metadata)?;
        sql::search_region(&conn, request)
    }

    fn counts_by_contig(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        limit: u64,
    ) -> Result<BTreeMap<String, u64>> {
        let conn = self.connect(metadata)?;
        sql::counts_by_contig(&conn, limit)
    }

    fn count_for_contig(
        &self,
        metadata: &ObjectMetadata,
        _token: &str,
        contig_id: &str,
    ) -> Result<u64> {
        let conn = self.connect(metadata)?;
        sql::count_for_contig(&conn, contig_id)
    }

    fn counts_by_type(&self, metadata: &ObjectMetadata, _token: &str) -> Result<FeatureTypeCounts> {
        let conn = self.connect(metadata)?;
        sql::counts_by_type(&conn)
    }
}
