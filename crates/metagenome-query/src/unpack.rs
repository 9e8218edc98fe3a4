// SPDX-License-Identifier: Apache-2.0

//! Index lines back into records. Pure parses; a malformed line is a parse
//! error carrying the line.

use metagenome_core::{Error, Result};
use metagenome_model::{Bin, ContigInBin, Feature};
use std::fmt::Display;
use std::str::FromStr;

fn fields<'a>(kind: &str, line: &'a str, expected: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < expected {
        return Err(Error::parse_line(
            kind,
            line,
            format!("expected {expected} fields, found {}", fields.len()),
        ));
    }
    Ok(fields)
}

fn optional<T>(kind: &str, line: &str, raw: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|e| Error::parse_line(kind, line, format!("'{raw}': {e}")))
}

fn required<T>(kind: &str, line: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| Error::parse_line(kind, line, format!("'{raw}': {e}")))
}

pub fn unpack_bin(line: &str) -> Result<Bin> {
    let f = fields("bin", line, 5)?;
    Ok(Bin {
        bin_id: f[0].to_string(),
        n_contigs: optional("bin", line, f[1])?,
        sum_contig_len: optional("bin", line, f[2])?,
        gc: optional("bin", line, f[3])?,
        cov: optional("bin", line, f[4])?,
    })
}

pub fn unpack_contig_in_bin(line: &str) -> Result<ContigInBin> {
    let f = fields("contig", line, 4)?;
    Ok(ContigInBin {
        contig_id: f[0].to_string(),
        len: required("contig", line, f[1])?,
        gc: required("contig", line, f[2])?,
        cov: optional("contig", line, f[3])?,
    })
}

/// Flat-file feature line; the record is the JSON document in field 10.
pub fn unpack_feature(line: &str) -> Result<Feature> {
    let f = fields("feature", line, 10)?;
    serde_json::from_str(f[9]).map_err(|e| Error::parse_line("feature", line, e))
}
