// SPDX-License-Identifier: Apache-2.0

//! Ordered scan with the count shortcut: items are collected only inside the
//! window, matches are counted to the end unless the caller already knows
//! the total.

use metagenome_core::Result;
use metagenome_model::Page;

use crate::request::Window;

pub fn scan_page<T, I, K, U>(lines: I, window: &Window, mut keep: K, mut unpack: U) -> Result<Page<T>>
where
    I: IntoIterator<Item = Result<String>>,
    K: FnMut(&str) -> bool,
    U: FnMut(&str) -> Result<T>,
{
    let end = window.end();
    let mut items = Vec::new();
    let mut count = 0_u64;
    for line in lines {
        let line = line?;
        if !keep(&line) {
            continue;
        }
        if count >= window.start && count < end {
            items.push(unpack(&line)?);
        }
        count += 1;
        if let Some(total) = window.known_total {
            if count >= end {
                count = total;
                break;
            }
        }
    }
    Ok(Page {
        items,
        num_found: count,
        start: window.start,
    })
}

/// Searchable part of a flat-file feature line: the display fields between
/// the leading ordinal and the trailing JSON record.
#[must_use]
pub fn display_fields(line: &str) -> &str {
    let Some((_, rest)) = line.split_once('\t') else {
        return "";
    };
    rest.rsplit_once('\t').map(|(fields, _)| fields).unwrap_or("")
}
