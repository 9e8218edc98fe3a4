// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_model::{Fingerprint, ObjectMetadata, Reference};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

use crate::http::{build_client, transport_error, validate_base_url, HttpOptions};
use crate::ObjectStore;

const SERVICE: &str = "workspace";
/// Position of the content checksum in a workspace object info tuple.
const INFO_CHECKSUM_POS: usize = 8;
const HANDLE_FIELD: &str = "features_handle_ref";

#[derive(Serialize)]
struct RpcRequest<'a> {
    version: &'static str,
    method: &'a str,
    params: [Value; 1],
    id: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

/// Workspace service client speaking JSON-RPC 1.1.
pub struct WorkspaceClient {
    url: String,
    client: Client,
    next_id: AtomicU64,
}

impl WorkspaceClient {
    pub fn new(url: &str, options: &HttpOptions) -> Result<Self> {
        validate_base_url(url)?;
        Ok(Self {
            url: url.to_string(),
            client: build_client(options)?,
            next_id: AtomicU64::new(1),
        })
    }

    fn call(&self, method: &str, params: Value, token: &str) -> Result<Value> {
        let request = RpcRequest {
            version: "1.1",
            method,
            params: [params],
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
        };
        let started = Instant::now();
        let mut req = self.client.post(&self.url).json(&request);
        if !token.is_empty() {
            req = req.header(AUTHORIZATION, token);
        }
        let resp = req.send().map_err(|e| transport_error(SERVICE, e))?;
        // Workspace errors arrive as HTTP 500 with a JSON-RPC error body.
        let body: RpcResponse = resp
            .json()
            .map_err(|e| Error::backend_unavailable(format!("{SERVICE} response: {e}")))?;
        debug!(
            method,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workspace call"
        );
        if let Some(err) = body.error {
            return Err(classify_rpc_error(&err.name, &err.message));
        }
        body.result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
            .ok_or_else(|| Error::backend_unavailable(format!("{SERVICE} {method}: empty result")))
    }

    fn first_object(result: Value, reference: &Reference) -> Result<Value> {
        match result {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(mut data)) if !data.is_empty() => Ok(data.swap_remove(0)),
                _ => Err(Error::not_found(format!("no object data for {reference}"))),
            },
            _ => Err(Error::backend_unavailable(format!(
                "{SERVICE} returned a non-object result for {reference}"
            ))),
        }
    }
}

impl ObjectStore for WorkspaceClient {
    fn get_metadata(&self, reference: &Reference, token: &str) -> Result<ObjectMetadata> {
        let params = json!({
            "objects": [{"ref": reference.as_str(), "included": [HANDLE_FIELD]}],
            "ignoreErrors": 0
        });
        let result = self.call("Workspace.get_objects2", params, token)?;
        let object = Self::first_object(result, reference)?;
        metadata_from_object(reference, &object)
    }

    fn get_fields(&self, reference: &Reference, token: &str, paths: &[String]) -> Result<Value> {
        let params = json!({
            "objects": [{"ref": reference.as_str(), "included": paths}],
            "ignoreErrors": 0
        });
        let result = self.call("Workspace.get_objects2", params, token)?;
        let mut object = Self::first_object(result, reference)?;
        object
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| Error::not_found(format!("object {reference} carries no data")))
    }
}

pub(crate) fn metadata_from_object(reference: &Reference, object: &Value) -> Result<ObjectMetadata> {
    let checksum = object
        .get("info")
        .and_then(|info| info.get(INFO_CHECKSUM_POS))
        .and_then(Value::as_str)
        .ok_or_else(|| Error::backend_unavailable(format!("object info for {reference} lacks a checksum")))?;
    let fingerprint = Fingerprint::parse(checksum)?;
    let copied_from = match object.get("copied").and_then(Value::as_str) {
        Some(raw) => Some(Reference::parse(raw)?),
        None => None,
    };
    let handle_id = object
        .get("data")
        .and_then(|d| d.get(HANDLE_FIELD))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(ObjectMetadata {
        reference: reference.clone(),
        fingerprint,
        copied_from,
        handle_id,
    })
}

fn classify_rpc_error(name: &str, message: &str) -> Error {
    let text = message.to_ascii_lowercase();
    let detail = format!("{name}: {message}");
    if text.contains("may not read")
        || text.contains("cannot be accessed")
        || text.contains("not authorized")
        || text.contains("token")
    {
        Error::access(detail)
    } else if text.contains("no object")
        || text.contains("does not exist")
        || text.contains("is deleted")
        || text.contains("no workspace")
    {
        Error::not_found(detail)
    } else {
        Error::backend_unavailable(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metagenome_core::ErrorCode;

    #[test]
    fn metadata_reads_checksum_copy_and_handle() {
        let reference = Reference::parse("7/8/9").expect("ref");
        let object = json!({
            "info": [8, "ama", "KBaseMetagenomes.AnnotatedMetagenomeAssembly-1.0",
                     "2020-01-01", 9, "user", 7, "ws", "5d41402abc4b2a76", 100, {}],
            "copied": "1/2/3",
            "data": {"features_handle_ref": "KBH_1234"}
        });
        let meta = metadata_from_object(&reference, &object).expect("meta");
        assert_eq!(meta.fingerprint.as_str(), "5d41402abc4b2a76");
        assert_eq!(meta.copied_from.expect("copy").as_str(), "1/2/3");
        assert_eq!(meta.handle_id.as_deref(), Some("KBH_1234"));
    }

    #[test]
    fn rpc_errors_map_to_taxonomy() {
        let denied = classify_rpc_error(
            "JSONRPCError",
            "User anonymous may not read workspace 7",
        );
        assert_eq!(denied.code, ErrorCode::Access);
        let missing = classify_rpc_error("JSONRPCError", "No object with id 9 exists in workspace 7");
        assert_eq!(missing.code, ErrorCode::NotFound);
        let other = classify_rpc_error("JSONRPCError", "database is down");
        assert_eq!(other.code, ErrorCode::BackendUnavailable);
    }

    #[test]
    fn client_rejects_non_http_urls() {
        assert!(WorkspaceClient::new("ftp://ws", &HttpOptions::default()).is_err());
        assert!(WorkspaceClient::new("https://kbase.us/services/ws", &HttpOptions::default()).is_ok());
    }
}
