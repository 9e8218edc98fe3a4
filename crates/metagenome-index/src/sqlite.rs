// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_model::Feature;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const FEATURE_STORE_SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
    PRAGMA journal_mode=DELETE;
    PRAGMA synchronous=NORMAL;
    PRAGMA temp_store=MEMORY;
    PRAGMA cache_size=-32000;
    CREATE TABLE features (
      id TEXT PRIMARY KEY NOT NULL,
      contig_id TEXT NOT NULL,
      type TEXT NOT NULL,
      starts INTEGER NOT NULL,
      stops INTEGER NOT NULL,
      size INTEGER NOT NULL,
      functions TEXT NOT NULL,
      functional_descriptions TEXT NOT NULL,
      strands TEXT NOT NULL,
      json TEXT NOT NULL
    );
";

const INDEXES: &str = "
    CREATE INDEX idx_features_starts ON features(starts);
    CREATE INDEX idx_features_stops ON features(stops);
    CREATE INDEX idx_features_contig_id ON features(contig_id);
    CREATE INDEX idx_features_size ON features(size);
    CREATE INDEX idx_features_type ON features(type);
    CREATE INDEX idx_features_functions ON features(functions);
    CREATE INDEX idx_features_functional_descriptions ON features(functional_descriptions);
";

const INSERT: &str = "INSERT INTO features (
      id, contig_id, type, starts, stops, size, functions, functional_descriptions, strands, json
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

pub(crate) fn sql_err(e: rusqlite::Error) -> Error {
    Error::internal(format!("sqlite: {e}"))
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub commit_rows: usize,
    pub commit_interval: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            commit_rows: 10_000,
            commit_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub inserted: u64,
    pub duplicates: u64,
    pub without_location: u64,
    pub commits: u64,
}

/// Writes a fresh feature store at `path`. Rows are committed every
/// `commit_rows` rows or `commit_interval`, whichever comes first, and
/// `on_commit` runs after each intermediate commit.
pub fn write_feature_store<I>(
    path: &Path,
    features: I,
    options: &WriteOptions,
    mut on_commit: impl FnMut(&BuildStats) -> Result<()>,
) -> Result<BuildStats>
where
    I: IntoIterator<Item = Feature>,
{
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let conn = Connection::open(path).map_err(sql_err)?;
    conn.execute_batch(SCHEMA).map_err(sql_err)?;
    conn.execute_batch(&format!(
        "PRAGMA user_version={FEATURE_STORE_SCHEMA_VERSION};"
    ))
    .map_err(sql_err)?;

    let mut stats = BuildStats::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending = 0_usize;
    let mut last_commit = Instant::now();

    conn.execute_batch("BEGIN").map_err(sql_err)?;
    {
        let mut stmt = conn.prepare(INSERT).map_err(sql_err)?;
        for feature in features {
            let Some(span) = feature.span() else {
                warn!(feature_id = %feature.id, "feature without location skipped");
                stats.without_location += 1;
                continue;
            };
            if !seen.insert(feature.id.clone()) {
                warn!(feature_id = %feature.id, "duplicate feature id skipped");
                stats.duplicates += 1;
                continue;
            }
            let json = serde_json::to_string(&feature)?;
            stmt.execute(params![
                feature.id,
                span.contig_id,
                feature.feature_type,
                span.start,
                span.stop,
                span.length,
                feature.functions.join(", "),
                feature.functional_descriptions.join(", "),
                span.strand.as_str(),
                json
            ])
            .map_err(sql_err)?;
            stats.inserted += 1;
            pending += 1;

            if pending >= options.commit_rows || last_commit.elapsed() >= options.commit_interval
            {
                conn.execute_batch("COMMIT; BEGIN").map_err(sql_err)?;
                stats.commits += 1;
                pending = 0;
                last_commit = Instant::now();
                info!(
                    store = %path.display(),
                    inserted = stats.inserted,
                    "feature store progress"
                );
                on_commit(&stats)?;
            }
        }
    }
    conn.execute_batch(INDEXES).map_err(sql_err)?;
    conn.execute_batch("COMMIT").map_err(sql_err)?;
    stats.commits += 1;
    conn.close().map_err(|(_, e)| sql_err(e))?;
    Ok(stats)
}

pub fn open_readonly(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::io(format!("failed to open {}: {e}", path.display())))
}
