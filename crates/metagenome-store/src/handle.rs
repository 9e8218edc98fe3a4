// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

use crate::http::{build_client, require_success, transport_error, validate_base_url, HttpOptions};
use crate::BlobStore;

const SERVICE: &str = "handle service";

#[derive(Debug, Deserialize)]
struct HandleRecord {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct HandleResponse {
    #[serde(default)]
    result: Option<Vec<Vec<HandleRecord>>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Resolves handle ids to blob node URLs and downloads raw node content.
pub struct HandleClient {
    url: String,
    client: Client,
}

impl HandleClient {
    pub fn new(url: &str, options: &HttpOptions) -> Result<Self> {
        validate_base_url(url)?;
        Ok(Self {
            url: url.to_string(),
            client: build_client(options)?,
        })
    }
}

pub(crate) fn node_download_url(node_base: &str, node_id: &str) -> String {
    format!(
        "{}/node/{}?download_raw",
        node_base.trim_end_matches('/'),
        node_id
    )
}

impl BlobStore for HandleClient {
    fn resolve(&self, handle_id: &str, token: &str) -> Result<String> {
        let body = json!({
            "version": "1.1",
            "method": "AbstractHandle.hids_to_handles",
            "params": [[handle_id]],
            "id": "1"
        });
        let resp = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, token)
            .json(&body)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let parsed: HandleResponse = resp
            .json()
            .map_err(|e| Error::backend_unavailable(format!("{SERVICE} response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(Error::backend_unavailable(format!(
                "{SERVICE} rejected {handle_id}: {err}"
            )));
        }
        let record = parsed
            .result
            .and_then(|outer| outer.into_iter().next())
            .and_then(|inner| inner.into_iter().next())
            .ok_or_else(|| Error::not_found(format!("no handle with id {handle_id}")))?;
        Ok(node_download_url(&record.url, &record.id))
    }

    fn download(&self, url: &str, token: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        debug!(url, "downloading blob");
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("OAuth {token}"))
            .send()
            .map_err(|e| transport_error("blob store", e))?;
        let resp = require_success("blob store", resp)?;
        let bytes = resp
            .bytes()
            .map_err(|e| transport_error("blob store", e))?;
        info!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "blob downloaded"
        );
        Ok(bytes.to_vec())
    }
}
