// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use metagenome_model::{Fingerprint, ObjectMetadata, Reference};
use serde_json::{json, Value};
use std::io::Write;

pub const HANDLE: &str = "KBH_77";

pub fn gzip_json(value: &Value) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(&serde_json::to_vec(value).expect("json"))
        .expect("gzip");
    enc.finish().expect("finish")
}

pub fn metadata() -> ObjectMetadata {
    ObjectMetadata {
        reference: Reference::parse("44/2/1").expect("ref"),
        fingerprint: Fingerprint::parse("0a1b2c").expect("fp"),
        copied_from: None,
        handle_id: Some(HANDLE.to_string()),
    }
}

/// Spans: f1 c1 [100,200], f2 c1 [300,400], f3 c1 [950,1000], f4 c2 [100,110].
pub fn features() -> Value {
    json!([
        {"id": "f1", "type": "gene", "location": [["c1", 100, "+", 100]],
         "functions": ["protein kinase"], "dna_sequence_length": 100},
        {"id": "f2", "type": "CDS", "location": [["c1", 300, "+", 100]],
         "functions": ["ABC transporter"]},
        {"id": "f3", "type": "CDS", "location": [["c1", 1000, "-", 50]],
         "functions": ["kinase regulator", "transporter"]},
        {"id": "f4", "type": "gene", "location": [["c2", 100, "+", 10]],
         "functions": ["hypothetical protein"]}
    ])
}

pub fn assembly() -> Value {
    json!({
        "contig_ids": ["c1", "c2", "c3"],
        "contig_lengths": [5000, 200, 900]
    })
}

pub fn ids<T>(items: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|i| id(i).to_string()).collect()
}
