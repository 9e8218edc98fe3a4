// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_model::{encode_bin_key, ObjectMetadata};
use metagenome_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;

use crate::columns::RecordKind;
use crate::encode::{bin_lines, contig_lines};
use crate::flatfile::FlatFileIndexer;

const BIN_FIELDS: [&str; 5] = [
    "/bins/[*]/bid",
    "/bins/[*]/gc",
    "/bins/[*]/n_contigs",
    "/bins/[*]/sum_contig_len",
    "/bins/[*]/cov",
];

/// Flat-file indexes of binned-contig objects: one bins artifact per object
/// version and one contigs artifact per (object version, bin).
pub struct BinnedContigsIndex {
    files: Arc<FlatFileIndexer>,
    store: Arc<dyn ObjectStore>,
}

impl BinnedContigsIndex {
    #[must_use]
    pub fn new(files: Arc<FlatFileIndexer>, store: Arc<dyn ObjectStore>) -> Self {
        Self { files, store }
    }

    #[must_use]
    pub fn files(&self) -> &FlatFileIndexer {
        &self.files
    }

    #[must_use]
    pub fn contigs_key(metadata: &ObjectMetadata, bin_id: &str) -> String {
        format!("{}_{}", metadata.fingerprint, encode_bin_key(bin_id))
    }

    /// Ensures the bins artifact exists; returns its key.
    pub fn ensure_bins(&self, metadata: &ObjectMetadata, token: &str) -> Result<String> {
        let key = metadata.fingerprint.to_string();
        self.files.build(&key, RecordKind::Bins, || {
            let paths: Vec<String> = BIN_FIELDS.iter().map(|p| (*p).to_string()).collect();
            let data = self.store.get_fields(&metadata.reference, token, &paths)?;
            bin_lines(&data)
        })?;
        Ok(key)
    }

    /// Ensures the contigs artifact of `bin_id` exists; returns its key.
    /// Fails when the object has no such bin.
    pub fn ensure_contigs_in_bin(
        &self,
        metadata: &ObjectMetadata,
        token: &str,
        bin_id: &str,
    ) -> Result<String> {
        let key = Self::contigs_key(metadata, bin_id);
        self.files.build(&key, RecordKind::ContigsInBin, || {
            let position = self.bin_position(metadata, token, bin_id)?;
            let paths = vec![
                format!("/bins/{position}/contigs"),
                format!("/bins/{position}/bid"),
            ];
            let data = self.store.get_fields(&metadata.reference, token, &paths)?;
            let bin = data
                .get("bins")
                .and_then(|b| b.get(0))
                .ok_or_else(|| Error::internal("bin selection returned no bins"))?;
            if bin.get("bid").and_then(Value::as_str) != Some(bin_id) {
                return Err(Error::internal(format!(
                    "bin ids do not match on selection of position {position}"
                )));
            }
            let contigs = bin
                .get("contigs")
                .ok_or_else(|| Error::validation(format!("bin \"{bin_id}\" has no contigs")))?;
            contig_lines(contigs)
        })?;
        Ok(key)
    }

    fn bin_position(&self, metadata: &ObjectMetadata, token: &str, bin_id: &str) -> Result<usize> {
        let data = self.store.get_fields(
            &metadata.reference,
            token,
            &["/bins/[*]/bid".to_string()],
        )?;
        data.get("bins")
            .and_then(Value::as_array)
            .and_then(|bins| {
                bins.iter()
                    .position(|b| b.get("bid").and_then(Value::as_str) == Some(bin_id))
            })
            .ok_or_else(|| Error::not_found(format!("No Bin with ID: \"{bin_id}\" found.")))
    }
}
