// SPDX-License-Identifier: Apache-2.0

//! JSON method boundary over [`MetagenomeApi`]: a method name and a params
//! object in, a JSON result or a [`MachineError`] out.

use metagenome_core::{Error, MachineError, Result};
use metagenome_query::{ContigsRequest, PageRequest, RegionRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::MetagenomeApi;

pub const METHODS: [&str; 7] = [
    "search_bins",
    "search_contigs_in_bin",
    "search_features",
    "search_region",
    "get_contig_info",
    "get_feature_type_counts",
    "search_contigs",
];

#[derive(Debug, Deserialize)]
struct Scoped<T> {
    #[serde(rename = "ref", default)]
    reference: String,
    #[serde(flatten)]
    request: T,
}

#[derive(Debug, Deserialize)]
struct BinScoped {
    #[serde(default)]
    bin_id: String,
    #[serde(flatten)]
    page: PageRequest,
}

#[derive(Debug, Deserialize)]
struct ContigScoped {
    #[serde(default)]
    contig_id: String,
}

#[derive(Debug, Deserialize)]
struct Nothing {}

fn params<T: DeserializeOwned>(raw: &Value) -> Result<Scoped<T>> {
    let scoped: Scoped<T> = serde_json::from_value(raw.clone())
        .map_err(|e| Error::validation(format!("invalid params: {e}")))?;
    if scoped.reference.is_empty() {
        return Err(Error::validation("ref input parameter field is missing"));
    }
    Ok(scoped)
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

impl MetagenomeApi {
    /// Runs `method` with JSON `params`. Failures carry the method name and,
    /// once parsed, the reference in their details.
    pub fn call(
        &self,
        method: &str,
        raw: &Value,
        token: &str,
    ) -> std::result::Result<Value, MachineError> {
        let reference = raw.get("ref").and_then(Value::as_str).unwrap_or_default();
        self.route(method, raw, token).map_err(|err| {
            warn!(method, reference, code = %err.code, error = %err.message, "call failed");
            let machine = MachineError::from(err).with_detail("method", method);
            if reference.is_empty() {
                machine
            } else {
                machine.with_detail("ref", reference)
            }
        })
    }

    fn route(&self, method: &str, raw: &Value, token: &str) -> Result<Value> {
        match method {
            "search_bins" => {
                let p = params::<PageRequest>(raw)?;
                to_json(&self.search_bins(&p.reference, token, &p.request)?)
            }
            "search_contigs_in_bin" => {
                let p = params::<BinScoped>(raw)?;
                to_json(&self.search_contigs_in_bin(
                    &p.reference,
                    token,
                    &p.request.bin_id,
                    &p.request.page,
                )?)
            }
            "search_features" => {
                let p = params::<PageRequest>(raw)?;
                to_json(&self.search_features(&p.reference, token, &p.request)?)
            }
            "search_region" => {
                let p = params::<RegionRequest>(raw)?;
                to_json(&self.search_region(&p.reference, token, &p.request)?)
            }
            "get_contig_info" => {
                let p = params::<ContigScoped>(raw)?;
                if p.request.contig_id.is_empty() {
                    return Err(Error::validation("contig_id input parameter field is missing"));
                }
                to_json(&self.get_contig_info(&p.reference, token, &p.request.contig_id)?)
            }
            "get_feature_type_counts" => {
                let p = params::<Nothing>(raw)?;
                to_json(&self.get_feature_type_counts(&p.reference, token)?)
            }
            "search_contigs" => {
                let p = params::<ContigsRequest>(raw)?;
                to_json(&self.search_contigs(&p.reference, token, &p.request)?)
            }
            other => Err(Error::validation(format!(
                "unknown method '{other}', expected one of [{}]",
                METHODS.join(", ")
            ))),
        }
    }
}
