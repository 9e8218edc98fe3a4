// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Metagenome search facade: one entry point per exposed operation, wiring
//! the metadata cache, the flat-file bins index, the configured feature
//! backend and the contig composite.

pub mod config;
pub mod dispatch;
pub mod logging;

use metagenome_core::{Error, Result};
use metagenome_index::{
    BinnedContigsIndex, BuildPool, EmbeddedIndexer, EmbeddedOptions, FlatFileIndexer,
    MetadataCache,
};
use metagenome_model::{
    BinPage, ContigInBinPage, ContigPage, ContigSummary, FeatureData, FeaturePage,
    FeatureTypeCounts, ObjectMetadata, Reference, RegionPage,
};
use metagenome_query::{
    ContigComposite, FeatureIndexBackend, FlatFileFeatureBackend, SearchFields,
    SearchServiceBackend, SqliteBackend,
};
use metagenome_store::{
    BlobStore, HandleClient, HttpOptions, HttpResultCache, HttpSearchService, ObjectStore,
    ResultCache, SearchService, WorkspaceClient,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub use config::{validate_config_contract, ApiConfig, BackendKind};
pub use metagenome_core::MachineError;
pub use metagenome_query::{ContigsRequest, PageRequest, RegionRequest};

pub const CRATE_NAME: &str = "metagenome-api";

/// Result cache used when no cache service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn get(&self, _key: &str, _token: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _token: &str, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Remote collaborators of the facade.
pub struct Collaborators {
    pub objects: Arc<dyn ObjectStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub search: Option<Arc<dyn SearchService>>,
    pub cache: Arc<dyn ResultCache>,
}

pub struct MetagenomeApi {
    config: ApiConfig,
    objects: Arc<dyn ObjectStore>,
    metadata: MetadataCache,
    binned: BinnedContigsIndex,
    features: Box<dyn FeatureIndexBackend>,
    cache: Arc<dyn ResultCache>,
    pool: Arc<BuildPool>,
}

impl MetagenomeApi {
    /// Connects to the configured services over HTTP.
    pub fn from_config(config: ApiConfig) -> Result<Self> {
        validate_config_contract(&config, true)?;
        let http = HttpOptions {
            timeout: config.http_timeout(),
        };
        let objects: Arc<dyn ObjectStore> =
            Arc::new(WorkspaceClient::new(&config.workspace_url, &http)?);
        let blobs: Arc<dyn BlobStore> =
            Arc::new(HandleClient::new(&config.handle_service_url, &http)?);
        let search: Option<Arc<dyn SearchService>> = match &config.search_url {
            Some(url) => Some(Arc::new(HttpSearchService::new(url, &http)?)),
            None => None,
        };
        let cache: Arc<dyn ResultCache> = match &config.cache_url {
            Some(url) => Arc::new(HttpResultCache::new(url, &http)?),
            None => Arc::new(NoCache),
        };
        Self::assemble(
            config,
            Collaborators {
                objects,
                blobs,
                search,
                cache,
            },
        )
    }

    pub fn with_collaborators(config: ApiConfig, collaborators: Collaborators) -> Result<Self> {
        validate_config_contract(&config, false)?;
        Self::assemble(config, collaborators)
    }

    fn assemble(config: ApiConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            objects,
            blobs,
            search,
            cache,
        } = collaborators;
        let fields = SearchFields::with_extra(&config.keyword_fields, &config.text_fields)?;
        let pool = Arc::new(BuildPool::new(config.workers)?);
        let files = Arc::new(FlatFileIndexer::new(
            &config.index_dir,
            config.in_memory_sort_limit,
        )?);
        let features: Box<dyn FeatureIndexBackend> = match config.backend {
            BackendKind::Sqlite => {
                let options = EmbeddedOptions {
                    lease_timeout: config.lease_timeout(),
                    write: metagenome_index::sqlite::WriteOptions {
                        commit_rows: config.commit_rows,
                        commit_interval: config.commit_interval(),
                    },
                };
                let indexer = EmbeddedIndexer::new(
                    &config.index_dir,
                    options,
                    Arc::clone(&blobs),
                    Arc::clone(&pool),
                )?;
                Box::new(SqliteBackend::new(indexer, fields))
            }
            BackendKind::Flatfile => Box::new(FlatFileFeatureBackend::new(
                Arc::clone(&files),
                Arc::clone(&blobs),
                Arc::clone(&pool),
            )),
            BackendKind::Search => {
                let service = search.ok_or_else(|| {
                    Error::validation("backend=search requires a search service")
                })?;
                Box::new(SearchServiceBackend::new(service, fields))
            }
        };
        info!(
            backend = features.name(),
            index_dir = %config.index_dir.display(),
            workers = config.workers,
            "metagenome api ready"
        );
        Ok(Self {
            metadata: MetadataCache::new(config.metadata_ttl(), config.metadata_capacity),
            binned: BinnedContigsIndex::new(files, Arc::clone(&objects)),
            objects,
            features,
            cache,
            pool,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.features.name()
    }

    #[must_use]
    pub fn build_pool(&self) -> &BuildPool {
        &self.pool
    }

    fn metadata(&self, reference: &str, token: &str) -> Result<ObjectMetadata> {
        let reference = Reference::parse(reference)?;
        self.metadata
            .get_metadata(self.objects.as_ref(), &reference, token)
    }

    fn page_request(&self, request: &PageRequest) -> PageRequest {
        let mut request = request.clone();
        if request.limit == 0 {
            request.limit = self.config.default_limit;
        }
        request
    }

    fn composite(&self) -> ContigComposite<'_> {
        ContigComposite {
            store: self.objects.as_ref(),
            backend: self.features.as_ref(),
            cache: self.cache.as_ref(),
        }
    }

    pub fn search_bins(
        &self,
        reference: &str,
        token: &str,
        request: &PageRequest,
    ) -> Result<BinPage> {
        let metadata = self.metadata(reference, token)?;
        metagenome_query::search_bins(&self.binned, &metadata, token, &self.page_request(request))
    }

    pub fn search_contigs_in_bin(
        &self,
        reference: &str,
        token: &str,
        bin_id: &str,
        request: &PageRequest,
    ) -> Result<ContigInBinPage> {
        let metadata = self.metadata(reference, token)?;
        metagenome_query::search_contigs_in_bin(
            &self.binned,
            &metadata,
            token,
            bin_id,
            &self.page_request(request),
        )
    }

    /// Features matching the query; an empty page flagged `indexing` while
    /// the backend is still building.
    pub fn search_features(
        &self,
        reference: &str,
        token: &str,
        request: &PageRequest,
    ) -> Result<FeaturePage> {
        let metadata = self.metadata(reference, token)?;
        let request = self.page_request(request);
        if !self.features.ensure_ready(&metadata, token)? {
            debug!(reference = %metadata.reference, "features requested while indexing");
            return Ok(FeaturePage {
                features: Vec::new(),
                num_found: 0,
                start: request.start,
                query: request.query,
                indexing: true,
            });
        }
        let started = Instant::now();
        let page = self.features.query(&metadata, token, &request)?;
        debug!(
            reference = %metadata.reference,
            backend = self.features.name(),
            num_found = page.num_found,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "feature search"
        );
        let page = page.map(FeatureData::from);
        Ok(FeaturePage {
            features: page.items,
            num_found: page.num_found,
            start: page.start,
            query: request.query,
            indexing: false,
        })
    }

    pub fn search_region(
        &self,
        reference: &str,
        token: &str,
        request: &RegionRequest,
    ) -> Result<RegionPage> {
        let metadata = self.metadata(reference, token)?;
        let mut request = request.clone();
        if request.limit == 0 {
            request.limit = self.config.default_limit;
        }
        let page = if self.features.ensure_ready(&metadata, token)? {
            Some(self.features.query_region(&metadata, token, &request)?)
        } else {
            debug!(reference = %metadata.reference, "region requested while indexing");
            None
        };
        let indexing = page.is_none();
        let (features, num_found, start) = match page {
            Some(page) => {
                let page = page.map(FeatureData::from);
                (page.items, page.num_found, page.start)
            }
            None => (Vec::new(), 0, request.start),
        };
        Ok(RegionPage {
            features,
            num_found,
            start,
            contig_id: request.contig_id,
            region_start: request.region_start,
            region_length: request.region_length,
            indexing,
        })
    }

    pub fn get_contig_info(
        &self,
        reference: &str,
        token: &str,
        contig_id: &str,
    ) -> Result<ContigSummary> {
        let metadata = self.metadata(reference, token)?;
        self.composite().contig_info(&metadata, token, contig_id)
    }

    /// Feature counts per type; empty while the backend is building.
    pub fn get_feature_type_counts(
        &self,
        reference: &str,
        token: &str,
    ) -> Result<FeatureTypeCounts> {
        let metadata = self.metadata(reference, token)?;
        if !self.features.ensure_ready(&metadata, token)? {
            return Ok(FeatureTypeCounts::new());
        }
        self.features.counts_by_type(&metadata, token)
    }

    pub fn search_contigs(
        &self,
        reference: &str,
        token: &str,
        request: &ContigsRequest,
    ) -> Result<ContigPage> {
        let metadata = self.metadata(reference, token)?;
        let mut request = request.clone();
        if request.limit == 0 {
            request.limit = self.config.default_limit;
        }
        self.composite().search_contigs(&metadata, token, &request)
    }
}
