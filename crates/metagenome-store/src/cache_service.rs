// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::http::{build_client, transport_error, validate_base_url, HttpOptions};
use crate::ResultCache;

const SERVICE: &str = "cache service";

#[derive(Deserialize)]
struct UploadStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Key-value cache service: `GET {base}/cache/{key}` and a multipart
/// `POST {base}/cache/{key}` upload.
pub struct HttpResultCache {
    base: String,
    client: Client,
}

impl HttpResultCache {
    pub fn new(base: &str, options: &HttpOptions) -> Result<Self> {
        validate_base_url(base)?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client: build_client(options)?,
        })
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/cache/{key}", self.base)
    }
}

impl ResultCache for HttpResultCache {
    fn get(&self, key: &str, token: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .client
            .get(self.endpoint(key))
            .header(AUTHORIZATION, token)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        if resp.status() != StatusCode::OK {
            debug!(key, status = resp.status().as_u16(), "cache miss");
            return Ok(None);
        }
        let bytes = resp.bytes().map_err(|e| transport_error(SERVICE, e))?;
        Ok(Some(bytes.to_vec()))
    }

    fn put(&self, key: &str, token: &str, bytes: &[u8]) -> Result<()> {
        let part = Part::bytes(bytes.to_vec()).file_name("data.txt");
        let form = Form::new().part("file", part);
        let resp = self
            .client
            .post(self.endpoint(key))
            .header(AUTHORIZATION, token)
            .multipart(form)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let status: UploadStatus = resp
            .json()
            .map_err(|e| Error::backend_unavailable(format!("{SERVICE} response: {e}")))?;
        if status.status == "error" {
            return Err(Error::backend_unavailable(format!(
                "{SERVICE} rejected {key}: {}",
                status.error.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
