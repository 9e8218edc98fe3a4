// SPDX-License-Identifier: Apache-2.0

use metagenome_core::canonical::{stable_json_bytes, stable_json_hash_hex};
use serde_json::json;

#[test]
fn stable_json_sorts_nested_keys() {
    let a = json!({"ref": "1/2/3", "sort": {"column": "length", "ascending": false}});
    let b = json!({"sort": {"ascending": false, "column": "length"}, "ref": "1/2/3"});
    assert_eq!(
        stable_json_bytes(&a).expect("a"),
        stable_json_bytes(&b).expect("b")
    );
    assert_eq!(
        stable_json_hash_hex(&a).expect("a"),
        stable_json_hash_hex(&b).expect("b")
    );
}

#[test]
fn stable_hash_distinguishes_windows() {
    let first = json!({"ref": "1/2/3", "start": 0, "limit": 10});
    let second = json!({"ref": "1/2/3", "start": 10, "limit": 10});
    assert_ne!(
        stable_json_hash_hex(&first).expect("first"),
        stable_json_hash_hex(&second).expect("second")
    );
}
