// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Local index construction for metagenome objects: flat-file gzip TSV
//! artifacts for bins and contigs, embedded SQLite stores for features, the
//! object metadata cache and the background build pool.

mod binned;
pub mod builder;
pub mod columns;
mod embedded;
pub mod encode;
mod flatfile;
pub mod lease;
pub mod lines;
mod metadata_cache;
pub mod payload;
pub mod sort;
pub mod sqlite;

pub use binned::BinnedContigsIndex;
pub use builder::{BuildPool, DEFAULT_BUILD_WORKERS};
pub use columns::{ColumnTable, ColumnType, RecordKind, SortColumn};
pub use embedded::{EmbeddedIndexer, EmbeddedOptions, IndexState};
pub use flatfile::{FlatFileIndexer, DEFAULT_IN_MEMORY_SORT_LIMIT};
pub use lines::LineSource;
pub use metadata_cache::{MetadataCache, DEFAULT_METADATA_CAPACITY, DEFAULT_METADATA_TTL};
pub use sort::{ExternalSort, InMemorySort, SortStrategy};

pub const CRATE_NAME: &str = "metagenome-index";
