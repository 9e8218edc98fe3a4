// SPDX-License-Identifier: Apache-2.0

//! Column tables of the flat-file artifacts. Positions are 1-based, matching
//! the field numbers the external sort uses.

use metagenome_core::{Error, Result};
use metagenome_model::SortSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RecordKind {
    Bins,
    ContigsInBin,
    Features,
}

impl RecordKind {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Bins => "bins",
            Self::ContigsInBin => "ctgs",
            Self::Features => "feats",
        }
    }

    #[must_use]
    pub fn table(self) -> &'static ColumnTable {
        match self {
            Self::Bins => &BINS,
            Self::ContigsInBin => &CONTIGS_IN_BIN,
            Self::Features => &FEATURES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub position: usize,
    pub kind: ColumnType,
    pub sortable: bool,
}

const fn text(name: &'static str, position: usize) -> Column {
    Column {
        name,
        position,
        kind: ColumnType::Text,
        sortable: true,
    }
}

const fn numeric(name: &'static str, position: usize) -> Column {
    Column {
        name,
        position,
        kind: ColumnType::Numeric,
        sortable: true,
    }
}

/// A resolved sort key: field position, typing and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub position: usize,
    pub kind: ColumnType,
    pub ascending: bool,
}

#[derive(Debug)]
pub struct ColumnTable {
    pub label: &'static str,
    pub columns: &'static [Column],
    pub aliases: &'static [(&'static str, &'static str)],
}

pub static BINS: ColumnTable = ColumnTable {
    label: "bins",
    columns: &[
        text("bin_id", 1),
        numeric("n_contigs", 2),
        numeric("sum_contig_len", 3),
        numeric("gc", 4),
        numeric("cov", 5),
    ],
    aliases: &[],
};

pub static CONTIGS_IN_BIN: ColumnTable = ColumnTable {
    label: "contigs in bin",
    columns: &[
        text("id", 1),
        numeric("len", 2),
        numeric("gc", 3),
        numeric("cov", 4),
    ],
    aliases: &[("contig_id", "id")],
};

pub static FEATURES: ColumnTable = ColumnTable {
    label: "features",
    columns: &[
        numeric("ordinal", 1),
        text("id", 2),
        text("type", 3),
        text("contig_id", 4),
        text("strand", 5),
        numeric("starts", 6),
        numeric("stops", 7),
        numeric("size", 8),
        text("functions", 9),
        Column {
            name: "json",
            position: 10,
            kind: ColumnType::Text,
            sortable: false,
        },
    ],
    aliases: &[("contig_ids", "contig_id")],
};

impl ColumnTable {
    #[must_use]
    pub fn allowed_names(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.sortable)
            .map(|c| c.name)
            .collect()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        let canonical = self
            .aliases
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, target)| *target)
            .unwrap_or(name);
        self.columns
            .iter()
            .find(|c| c.name == canonical && c.sortable)
            .ok_or_else(|| {
                Error::validation(format!(
                    "Unknown column name '{name}' for {}, please use one of [{}]",
                    self.label,
                    self.allowed_names().join(", ")
                ))
            })
    }

    pub fn resolve(&self, spec: &SortSpec) -> Result<Vec<SortColumn>> {
        spec.keys()
            .map(|key| {
                self.column(&key.column).map(|c| SortColumn {
                    position: c.position,
                    kind: c.kind,
                    ascending: key.ascending,
                })
            })
            .collect()
    }

    /// File-name signature of a sort: `{position}{a|d}` per key.
    pub fn signature(&self, spec: &SortSpec) -> Result<String> {
        Ok(signature_of(&self.resolve(spec)?))
    }
}

#[must_use]
pub fn signature_of(keys: &[SortColumn]) -> String {
    keys.iter()
        .map(|k| format!("{}{}", k.position, if k.ascending { 'a' } else { 'd' }))
        .collect()
}
