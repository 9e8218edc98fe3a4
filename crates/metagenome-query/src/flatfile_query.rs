// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_index::{BinnedContigsIndex, RecordKind};
use metagenome_model::{BinPage, ContigInBinPage, ObjectMetadata};
use std::time::Instant;
use tracing::debug;

use crate::filter::Filter;
use crate::paginate::scan_page;
use crate::request::PageRequest;
use crate::unpack::{unpack_bin, unpack_contig_in_bin};

pub fn search_bins(
    index: &BinnedContigsIndex,
    metadata: &ObjectMetadata,
    token: &str,
    request: &PageRequest,
) -> Result<BinPage> {
    RecordKind::Bins.table().resolve(&request.sort)?;
    let started = Instant::now();
    let key = index.ensure_bins(metadata, token)?;
    let lines = index.files().open(&key, RecordKind::Bins, &request.sort)?;
    let filter = Filter::parse(&request.query);
    let page = scan_page(lines, &request.window(), |l| filter.matches(l), unpack_bin)?;
    debug!(
        reference = %metadata.reference,
        fingerprint = %metadata.fingerprint,
        num_found = page.num_found,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "bins query"
    );
    Ok(BinPage {
        bins: page.items,
        num_found: page.num_found,
        start: page.start,
        query: request.query.clone(),
    })
}

pub fn search_contigs_in_bin(
    index: &BinnedContigsIndex,
    metadata: &ObjectMetadata,
    token: &str,
    bin_id: &str,
    request: &PageRequest,
) -> Result<ContigInBinPage> {
    if bin_id.is_empty() {
        return Err(Error::validation("bin_id input parameter field is missing"));
    }
    RecordKind::ContigsInBin.table().resolve(&request.sort)?;
    let started = Instant::now();
    let key = index.ensure_contigs_in_bin(metadata, token, bin_id)?;
    let lines = index
        .files()
        .open(&key, RecordKind::ContigsInBin, &request.sort)?;
    let filter = Filter::parse(&request.query);
    let page = scan_page(
        lines,
        &request.window(),
        |l| filter.matches(l),
        unpack_contig_in_bin,
    )?;
    debug!(
        reference = %metadata.reference,
        bin_id,
        num_found = page.num_found,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "contigs in bin query"
    );
    Ok(ContigInBinPage {
        contigs: page.items,
        num_found: page.num_found,
        start: page.start,
        query: request.query.clone(),
        bin_id: bin_id.to_string(),
    })
}
