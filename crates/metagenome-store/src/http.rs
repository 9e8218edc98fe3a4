// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
        }
    }
}

pub(crate) fn build_client(options: &HttpOptions) -> Result<Client> {
    Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| Error::internal(format!("failed to build http client: {e}")))
}

pub(crate) fn validate_base_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::validation(format!("invalid service url {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::validation(format!(
            "unsupported service url scheme {other}"
        ))),
    }
}

pub(crate) fn transport_error(service: &str, err: reqwest::Error) -> Error {
    Error::backend_unavailable(format!("{service} request failed: {err}"))
}

/// Rejects non-success statuses, keeping a bounded slice of the body for
/// the error message.
pub(crate) fn require_success(service: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let snippet: String = body.chars().take(500).collect();
    let message = format!("{service} returned {status}: {snippet}");
    Err(match status.as_u16() {
        401 | 403 => Error::access(message),
        404 => Error::not_found(message),
        _ => Error::backend_unavailable(message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_build_with_the_configured_timeout() {
        let options = HttpOptions {
            timeout: Duration::from_secs(7),
        };
        assert!(build_client(&options).is_ok());
        assert!(crate::WorkspaceClient::new("https://ws.example/services/ws", &options).is_ok());
    }

    #[test]
    fn base_urls_must_be_http() {
        assert!(validate_base_url("https://ws.example").is_ok());
        let err = validate_base_url("ftp://ws.example").expect_err("scheme");
        assert_eq!(err.code, metagenome_core::ErrorCode::Validation);
    }
}
