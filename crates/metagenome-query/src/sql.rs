// SPDX-License-Identifier: Apache-2.0

//! Parameterized queries over the embedded feature store. Column names come
//! only from the fixed column list; filter values are always bound.

use metagenome_core::{Error, Result};
use metagenome_model::{Feature, FeatureTypeCounts, Page, SortSpec};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;

use crate::filter::tokenize;
use crate::request::RegionRequest;

pub const FEATURE_COLUMNS: [&str; 9] = [
    "id",
    "contig_id",
    "type",
    "starts",
    "stops",
    "size",
    "functions",
    "functional_descriptions",
    "strands",
];

pub const DEFAULT_KEYWORD_FIELDS: [&str; 2] = ["id", "type"];
pub const DEFAULT_TEXT_FIELDS: [&str; 2] = ["functions", "functional_descriptions"];

const SORT_ALIASES: [(&str, &str); 1] = [("contig_ids", "contig_id")];

fn sql_err(e: rusqlite::Error) -> Error {
    Error::internal(format!("sqlite: {e}"))
}

/// Resolves a caller-supplied column name to a store column.
pub fn feature_column(name: &str) -> Result<&'static str> {
    let canonical = SORT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name);
    FEATURE_COLUMNS
        .iter()
        .copied()
        .find(|c| *c == canonical)
        .ok_or_else(|| {
            Error::validation(format!(
                "Unknown column name '{name}' for features, please use one of [{}]",
                FEATURE_COLUMNS.join(", ")
            ))
        })
}

/// Columns matched exactly (keyword) and by substring (text) per token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFields {
    keyword: Vec<&'static str>,
    text: Vec<&'static str>,
}

impl Default for SearchFields {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD_FIELDS.to_vec(),
            text: DEFAULT_TEXT_FIELDS.to_vec(),
        }
    }
}

impl SearchFields {
    /// Defaults plus the configured extra fields; unknown names are rejected.
    pub fn with_extra(keyword: &[String], text: &[String]) -> Result<Self> {
        let mut fields = Self::default();
        for name in keyword {
            let column = feature_column(name.trim())?;
            if !fields.keyword.contains(&column) {
                fields.keyword.push(column);
            }
        }
        for name in text {
            let column = feature_column(name.trim())?;
            if !fields.text.contains(&column) {
                fields.text.push(column);
            }
        }
        Ok(fields)
    }

    #[must_use]
    pub fn keyword(&self) -> &[&'static str] {
        &self.keyword
    }

    #[must_use]
    pub fn text(&self) -> &[&'static str] {
        &self.text
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('!', "!!").replace('%', "!%").replace('_', "!_")
}

/// `WHERE` over the filter tokens: per token an OR across the search
/// fields, tokens AND'ed. Empty when there are no tokens.
pub fn filter_clause(query: &str, fields: &SearchFields) -> (String, Vec<Value>) {
    let mut groups = Vec::new();
    let mut params = Vec::new();
    for token in tokenize(query) {
        let mut ors = Vec::new();
        for column in &fields.keyword {
            ors.push(format!("{column} = ?"));
            params.push(Value::Text(token.clone()));
        }
        for column in &fields.text {
            ors.push(format!("{column} LIKE ? ESCAPE '!'"));
            params.push(Value::Text(format!("%{}%", escape_like(&token))));
        }
        if !ors.is_empty() {
            groups.push(format!("({})", ors.join(" OR ")));
        }
    }
    if groups.is_empty() {
        return (String::new(), params);
    }
    (format!(" WHERE {}", groups.join(" AND ")), params)
}

/// `ORDER BY` with `id` as the final tie-breaker.
pub fn order_clause(sort: &SortSpec) -> Result<String> {
    let mut terms = Vec::new();
    let mut has_id = false;
    for key in sort.keys() {
        let column = feature_column(&key.column)?;
        has_id |= column == "id";
        terms.push(format!(
            "{column} {}",
            if key.ascending { "ASC" } else { "DESC" }
        ));
    }
    if !has_id {
        terms.push("id ASC".to_string());
    }
    Ok(format!(" ORDER BY {}", terms.join(", ")))
}

fn count(conn: &Connection, where_sql: &str, params: &[Value]) -> Result<u64> {
    let sql = format!("SELECT count(*) FROM features{where_sql}");
    let n: i64 = conn
        .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .map_err(sql_err)?;
    Ok(u64::try_from(n).unwrap_or(0))
}

fn page(
    conn: &Connection,
    where_sql: &str,
    mut params: Vec<Value>,
    sort: &SortSpec,
    start: u64,
    limit: u64,
) -> Result<Vec<Feature>> {
    let sql = format!(
        "SELECT json FROM features{where_sql}{} LIMIT ? OFFSET ?",
        order_clause(sort)?
    );
    params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    params.push(Value::Integer(i64::try_from(start).unwrap_or(i64::MAX)));
    let mut stmt = conn.prepare_cached(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))
        .map_err(sql_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(sql_err)?;
    rows.iter()
        .map(|json| serde_json::from_str(json).map_err(|e| Error::parse_line("feature", json, e)))
        .collect()
}

/// Filtered, sorted page with an exact total.
pub fn search_features(
    conn: &Connection,
    fields: &SearchFields,
    query: &str,
    sort: &SortSpec,
    start: u64,
    limit: u64,
) -> Result<Page<Feature>> {
    order_clause(sort)?;
    let (where_sql, params) = filter_clause(query, fields);
    let num_found = count(conn, &where_sql, &params)?;
    let items = page(conn, &where_sql, params, sort, start, limit)?;
    Ok(Page {
        items,
        num_found,
        start,
    })
}

pub fn search_region(conn: &Connection, region: &RegionRequest) -> Result<Page<Feature>> {
    order_clause(&region.sort)?;
    let where_sql = " WHERE contig_id = ? AND starts <= ? AND stops >= ?";
    let params = vec![
        Value::Text(region.contig_id.clone()),
        Value::Integer(region.region_stop()),
        Value::Integer(region.region_start),
    ];
    let num_found = count(conn, where_sql, &params)?;
    let items = page(conn, where_sql, params, &region.sort, region.start, region.limit)?;
    Ok(Page {
        items,
        num_found,
        start: region.start,
    })
}

fn grouped(conn: &Connection, sql: &str, params: &[Value]) -> Result<BTreeMap<String, u64>> {
    let mut stmt = conn.prepare_cached(sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(sql_err)?;
    let mut out = BTreeMap::new();
    for row in rows {
        let (key, n) = row.map_err(sql_err)?;
        out.insert(key, u64::try_from(n).unwrap_or(0));
    }
    Ok(out)
}

/// Feature counts of up to `limit` contigs.
pub fn counts_by_contig(conn: &Connection, limit: u64) -> Result<BTreeMap<String, u64>> {
    grouped(
        conn,
        "SELECT contig_id, count(*) FROM features GROUP BY contig_id ORDER BY contig_id LIMIT ?",
        &[Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))],
    )
}

pub fn count_for_contig(conn: &Connection, contig_id: &str) -> Result<u64> {
    count(
        conn,
        " WHERE contig_id = ?",
        &[Value::Text(contig_id.to_string())],
    )
}

pub fn counts_by_type(conn: &Connection) -> Result<FeatureTypeCounts> {
    grouped(
        conn,
        "SELECT type, count(*) FROM features GROUP BY type",
        &[],
    )
}
