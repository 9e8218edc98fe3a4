// SPDX-License-Identifier: Apache-2.0

//! Record projections to tab-separated index lines. Field order follows the
//! column tables in [`crate::columns`].

use metagenome_core::{Error, Result};
use metagenome_model::Feature;
use serde_json::Value;

/// Tabs and line breaks inside values would shift or split columns.
fn clean(raw: &str) -> String {
    raw.replace(['\t', '\n', '\r'], " ")
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => clean(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| scalar_text(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => fixed_float(f),
            _ => n.to_string(),
        },
        Some(other) => clean(&other.to_string()),
    }
}

/// Fixed notation; `sort -n` reads `1e-05` as 1.
fn fixed_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

/// Lines for the `bins` projection (`/bins/[*]/{bid,n_contigs,...}`).
pub fn bin_lines(data: &Value) -> Result<Vec<String>> {
    let bins = data
        .get("bins")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::validation("binned contigs object has no bins array"))?;
    Ok(bins
        .iter()
        .map(|bin| {
            [
                scalar_text(bin.get("bid")),
                scalar_text(bin.get("n_contigs")),
                scalar_text(bin.get("sum_contig_len")),
                scalar_text(bin.get("gc")),
                scalar_text(bin.get("cov")),
            ]
            .join("\t")
        })
        .collect())
}

/// Lines for one bin's `contigs` map (`contig_id -> {len, gc, cov}`).
pub fn contig_lines(contigs: &Value) -> Result<Vec<String>> {
    let map = contigs
        .as_object()
        .ok_or_else(|| Error::validation("bin contigs is not an object"))?;
    Ok(map
        .iter()
        .map(|(contig_id, info)| {
            [
                clean(contig_id),
                scalar_text(info.get("len")),
                scalar_text(info.get("gc")),
                scalar_text(info.get("cov")),
            ]
            .join("\t")
        })
        .collect())
}

/// Flat-file feature line; `None` for a feature without a location.
pub fn feature_line(ordinal: u64, feature: &Feature) -> Result<Option<String>> {
    let Some(span) = feature.span() else {
        return Ok(None);
    };
    let json = serde_json::to_string(feature)?;
    Ok(Some(
        [
            ordinal.to_string(),
            clean(&feature.id),
            clean(&feature.feature_type),
            clean(&span.contig_id),
            span.strand.as_str().to_string(),
            span.start.to_string(),
            span.stop.to_string(),
            span.length.to_string(),
            clean(&feature.functions.join(", ")),
            json,
        ]
        .join("\t"),
    ))
}
