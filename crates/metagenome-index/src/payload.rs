// SPDX-License-Identifier: Apache-2.0

use flate2::read::GzDecoder;
use metagenome_core::{Error, Result};
use metagenome_model::{Feature, ObjectMetadata};
use metagenome_store::BlobStore;
use std::io::Read;
use std::time::Instant;
use tracing::info;

/// Resolves the object's feature handle, downloads and gunzips the payload
/// and decodes its JSON feature array.
pub fn fetch_features(
    blobs: &dyn BlobStore,
    metadata: &ObjectMetadata,
    token: &str,
) -> Result<Vec<Feature>> {
    let handle_id = metadata.handle_id.as_deref().ok_or_else(|| {
        Error::not_found(format!(
            "object {} has no feature payload handle",
            metadata.reference
        ))
    })?;
    let started = Instant::now();
    let url = blobs.resolve(handle_id, token)?;
    let compressed = blobs.download(&url, token)?;
    let features = decode_features(&compressed)?;
    info!(
        reference = %metadata.reference,
        handle_id,
        features = features.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "feature payload fetched"
    );
    Ok(features)
}

pub fn decode_features(compressed: &[u8]) -> Result<Vec<Feature>> {
    let mut raw = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| Error::new(metagenome_core::ErrorCode::Parse, format!("feature payload is not gzip: {e}")))?;
    serde_json::from_slice(&raw).map_err(|e| {
        Error::new(
            metagenome_core::ErrorCode::Parse,
            format!("feature payload is not a feature array: {e}"),
        )
    })
}
