// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Contracts for the remote collaborators the indexers depend on, with
//! blocking HTTP realizations and, behind the `testing` feature, in-memory
//! fakes.

mod cache_service;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
mod handle;
mod http;
mod search;
mod workspace;

use metagenome_core::Result;
use metagenome_model::{ObjectMetadata, Reference};
use serde_json::Value;

pub use cache_service::HttpResultCache;
pub use handle::HandleClient;
pub use http::HttpOptions;
pub use search::HttpSearchService;
pub use workspace::WorkspaceClient;

pub const CRATE_NAME: &str = "metagenome-store";

/// Remote object store. Every call passes the store's access check; access
/// and not-found failures propagate unchanged.
pub trait ObjectStore: Send + Sync {
    fn get_metadata(&self, reference: &Reference, token: &str) -> Result<ObjectMetadata>;

    /// Projection fetch: only the listed sub-paths of the object's data.
    fn get_fields(&self, reference: &Reference, token: &str, paths: &[String]) -> Result<Value>;
}

/// Blob/handle store holding the compressed bulk feature payload.
pub trait BlobStore: Send + Sync {
    fn resolve(&self, handle_id: &str, token: &str) -> Result<String>;
    fn download(&self, url: &str, token: &str) -> Result<Vec<u8>>;
}

/// Generic key-value cache for composite results.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str, token: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, token: &str, bytes: &[u8]) -> Result<()>;
}

/// External full-text/aggregation search service. Returns the `result`
/// member of the response envelope.
pub trait SearchService: Send + Sync {
    fn search(&self, request: &Value, token: &str) -> Result<Value>;
}
