// SPDX-License-Identifier: Apache-2.0

//! Multi-key line sorting with one ordering contract for every strategy:
//! numeric keys compare by leading numeric value (empty, `-0` or non-numeric
//! is 0, long integers exact),
//! text keys compare ASCII-case-folded bytes, descending reverses only its
//! own key, and ties fall back to whole-line byte order.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use metagenome_core::{Error, Result};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::columns::{ColumnType, SortColumn};
use crate::lines::{LineSource, ProcessLines};

pub trait SortStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sorted lines of the gzip file at `input`, streamed without persisting.
    fn sort_lines(&self, input: &Path, keys: &[SortColumn]) -> Result<LineSource>;

    /// Sorted gzip output written to `output`.
    fn sort_to_file(&self, input: &Path, keys: &[SortColumn], output: &Path) -> Result<()>;
}

fn field(line: &str, position: usize) -> &str {
    line.split('\t').nth(position.saturating_sub(1)).unwrap_or("")
}

/// Leading `[-]digits[.digits]` after blanks, as `sort -n` reads it in
/// the C locale. Digits are kept as text so long integers compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericKey<'a> {
    negative: bool,
    int: &'a str,
    frac: &'a str,
}

impl<'a> NumericKey<'a> {
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        let s = raw.trim_start_matches([' ', '\t']);
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let int_end = body
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(body.len());
        let int = body[..int_end].trim_start_matches('0');
        let frac = match body[int_end..].strip_prefix('.') {
            Some(rest) => {
                let end = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                rest[..end].trim_end_matches('0')
            }
            None => "",
        };
        // -0, 0 and an empty field are all zero.
        let negative = negative && !(int.is_empty() && frac.is_empty());
        Self {
            negative,
            int,
            frac,
        }
    }

    fn is_zero(&self) -> bool {
        self.int.is_empty() && self.frac.is_empty()
    }

    fn magnitude_cmp(&self, other: &Self) -> Ordering {
        self.int
            .len()
            .cmp(&other.int.len())
            .then_with(|| self.int.cmp(other.int))
            .then_with(|| self.frac.cmp(other.frac))
    }
}

impl Ord for NumericKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let sign = |k: &Self| -> i8 {
            if k.negative {
                -1
            } else if k.is_zero() {
                0
            } else {
                1
            }
        };
        match sign(self).cmp(&sign(other)) {
            Ordering::Equal if self.negative => other.magnitude_cmp(self),
            Ordering::Equal => self.magnitude_cmp(other),
            ord => ord,
        }
    }
}

impl PartialOrd for NumericKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn fold_cmp(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_uppercase())
        .cmp(b.bytes().map(|c| c.to_ascii_uppercase()))
}

#[must_use]
pub fn compare_lines(a: &str, b: &str, keys: &[SortColumn]) -> Ordering {
    for key in keys {
        let (fa, fb) = (field(a, key.position), field(b, key.position));
        let ord = match key.kind {
            ColumnType::Numeric => NumericKey::parse(fa).cmp(&NumericKey::parse(fb)),
            ColumnType::Text => fold_cmp(fa, fb),
        };
        let ord = if key.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.as_bytes().cmp(b.as_bytes())
}

fn read_gzip_lines(input: &Path) -> Result<Vec<String>> {
    let file = File::open(input)
        .map_err(|e| Error::io(format!("failed to open {}: {e}", input.display())))?;
    BufReader::new(GzDecoder::new(file))
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .map_err(Error::from)
}

/// Loads every line and sorts in process.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemorySort;

impl InMemorySort {
    fn sorted(input: &Path, keys: &[SortColumn]) -> Result<Vec<String>> {
        let mut lines = read_gzip_lines(input)?;
        lines.sort_by(|a, b| compare_lines(a, b, keys));
        Ok(lines)
    }
}

impl SortStrategy for InMemorySort {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn sort_lines(&self, input: &Path, keys: &[SortColumn]) -> Result<LineSource> {
        Ok(LineSource::memory(Self::sorted(input, keys)?))
    }

    fn sort_to_file(&self, input: &Path, keys: &[SortColumn], output: &Path) -> Result<()> {
        let lines = Self::sorted(input, keys)?;
        let file = File::create(output)?;
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        for line in &lines {
            enc.write_all(line.as_bytes())?;
            enc.write_all(b"\n")?;
        }
        enc.finish()?.flush()?;
        Ok(())
    }
}

/// Runs the system `sort` with the C locale, fed from a decompressing
/// thread. Text keys carry an explicit `f` so folding survives per-key
/// options.
#[derive(Debug, Clone)]
pub struct ExternalSort {
    program: String,
}

impl Default for ExternalSort {
    fn default() -> Self {
        Self {
            program: "sort".to_string(),
        }
    }
}

impl ExternalSort {
    #[cfg(test)]
    pub(crate) fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    #[must_use]
    pub fn key_args(keys: &[SortColumn]) -> Vec<String> {
        keys.iter()
            .map(|k| {
                let mut arg = format!("-k{0},{0}", k.position);
                arg.push(match k.kind {
                    ColumnType::Numeric => 'n',
                    ColumnType::Text => 'f',
                });
                if !k.ascending {
                    arg.push('r');
                }
                arg
            })
            .collect()
    }

    fn spawn(&self, input: &Path, keys: &[SortColumn]) -> Result<ProcessLines> {
        let args = Self::key_args(keys);
        debug!(program = %self.program, args = ?args, "spawning external sort");
        let mut child = Command::new(&self.program)
            .env("LC_ALL", "C")
            .arg("-t")
            .arg("\t")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::internal(format!("failed to spawn {}: {e}", self.program)))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::internal("sort subprocess has no stdin"))?;
        let source = File::open(input)
            .map_err(|e| Error::io(format!("failed to open {}: {e}", input.display())))?;
        let feeder = std::thread::spawn(move || -> Result<()> {
            let mut decoder = GzDecoder::new(source);
            io::copy(&mut decoder, &mut stdin)?;
            Ok(())
        });
        ProcessLines::new(child, Some(feeder))
    }
}

impl SortStrategy for ExternalSort {
    fn name(&self) -> &'static str {
        "external"
    }

    fn sort_lines(&self, input: &Path, keys: &[SortColumn]) -> Result<LineSource> {
        Ok(LineSource::Process(self.spawn(input, keys)?))
    }

    fn sort_to_file(&self, input: &Path, keys: &[SortColumn], output: &Path) -> Result<()> {
        let lines = self.spawn(input, keys)?;
        let file = File::create(output)?;
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        for line in lines {
            enc.write_all(line?.as_bytes())?;
            enc.write_all(b"\n")?;
        }
        enc.finish()?.flush()?;
        Ok(())
    }
}
