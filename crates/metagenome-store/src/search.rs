// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::http::{build_client, require_success, transport_error, validate_base_url, HttpOptions};
use crate::SearchService;

const SERVICE: &str = "search service";

pub struct HttpSearchService {
    url: String,
    client: Client,
}

impl HttpSearchService {
    pub fn new(url: &str, options: &HttpOptions) -> Result<Self> {
        validate_base_url(url)?;
        Ok(Self {
            url: url.to_string(),
            client: build_client(options)?,
        })
    }
}

/// Unwraps `{"result": {...}}`; anything else means the service is not
/// answering in its contract.
pub(crate) fn unwrap_envelope(mut body: Value) -> Result<Value> {
    match body.get_mut("result").map(Value::take) {
        Some(result @ Value::Object(_)) => Ok(result),
        _ => Err(Error::backend_unavailable(format!(
            "{SERVICE} response is missing the result envelope"
        ))),
    }
}

impl SearchService for HttpSearchService {
    fn search(&self, request: &Value, token: &str) -> Result<Value> {
        let resp = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, token)
            .json(request)
            .send()
            .map_err(|e| transport_error(SERVICE, e))?;
        let resp = require_success(SERVICE, resp)?;
        let body: Value = resp
            .json()
            .map_err(|e| Error::backend_unavailable(format!("{SERVICE} response: {e}")))?;
        unwrap_envelope(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagenome_core::ErrorCode;
    use serde_json::json;

    #[test]
    fn envelope_is_required() {
        let ok = unwrap_envelope(json!({"result": {"count": 1, "hits": []}})).expect("ok");
        assert_eq!(ok["count"], json!(1));
        let err = unwrap_envelope(json!({"hits": []})).expect_err("missing");
        assert_eq!(err.code, ErrorCode::BackendUnavailable);
        assert!(unwrap_envelope(json!({"result": null})).is_err());
    }
}
