// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod error;
pub mod fs;

use sha2::{Digest, Sha256};

pub use error::{Error, ErrorCode, MachineError, Result};

pub const CRATE_NAME: &str = "metagenome-core";

pub const ENV_METAGENOME_LOG_LEVEL: &str = "METAGENOME_LOG_LEVEL";
pub const ENV_METAGENOME_LOG_FORMAT: &str = "METAGENOME_LOG_FORMAT";

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub mod canonical {
    use serde::Serialize;
    use serde_json::{Map, Value};

    /// JSON bytes with object keys sorted at every depth, so equal values
    /// always hash equally regardless of field declaration order.
    pub fn stable_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
        let raw = serde_json::to_value(value)?;
        let normalized = normalize_json_value(raw);
        serde_json::to_vec(&normalized)
    }

    #[must_use]
    pub fn stable_hash_hex(bytes: &[u8]) -> String {
        super::sha256_hex(bytes)
    }

    pub fn stable_json_hash_hex<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
        let bytes = stable_json_bytes(value)?;
        Ok(stable_hash_hex(&bytes))
    }

    fn normalize_json_value(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<(String, Value)> = map
                    .into_iter()
                    .map(|(k, v)| (k, normalize_json_value(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                let mut sorted = Map::new();
                for (k, v) in entries {
                    sorted.insert(k, v);
                }
                Value::Object(sorted)
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(normalize_json_value).collect())
            }
            other => other,
        }
    }
}
