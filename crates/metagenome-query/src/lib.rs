// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
//! Query execution over metagenome indexes: line filters, the paginated
//! scan with the known-total shortcut, the SQL planner of the embedded
//! store, the feature backends and the contig summary composite.

mod backend;
mod backend_flatfile;
mod backend_search;
mod backend_sqlite;
pub mod contigs;
pub mod filter;
mod flatfile_query;
pub mod paginate;
mod request;
pub mod sql;
pub mod unpack;

pub use backend::FeatureIndexBackend;
pub use backend_flatfile::FlatFileFeatureBackend;
pub use backend_search::SearchServiceBackend;
pub use backend_sqlite::SqliteBackend;
pub use contigs::{ContigComposite, ContigsRequest};
pub use filter::Filter;
pub use flatfile_query::{search_bins, search_contigs_in_bin};
pub use request::{PageRequest, RegionRequest, Window};
pub use sql::SearchFields;

pub const CRATE_NAME: &str = "metagenome-query";
