// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result};
use metagenome_index::{
    DEFAULT_BUILD_WORKERS, DEFAULT_IN_MEMORY_SORT_LIMIT, DEFAULT_METADATA_CAPACITY,
};
use metagenome_model::DEFAULT_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const ENV_INDEX_DIR: &str = "METAGENOME_INDEX_DIR";
pub const ENV_WORKSPACE_URL: &str = "METAGENOME_WORKSPACE_URL";
pub const ENV_HANDLE_SERVICE_URL: &str = "METAGENOME_HANDLE_SERVICE_URL";
pub const ENV_SEARCH_URL: &str = "METAGENOME_SEARCH_URL";
pub const ENV_CACHE_URL: &str = "METAGENOME_CACHE_URL";
pub const ENV_BACKEND: &str = "METAGENOME_BACKEND";
pub const ENV_WORKERS: &str = "METAGENOME_WORKERS";
pub const ENV_METADATA_TTL_SECS: &str = "METAGENOME_METADATA_TTL_SECS";
pub const ENV_METADATA_CAPACITY: &str = "METAGENOME_METADATA_CAPACITY";
pub const ENV_LEASE_TIMEOUT_SECS: &str = "METAGENOME_LEASE_TIMEOUT_SECS";
pub const ENV_IN_MEMORY_SORT_LIMIT: &str = "METAGENOME_IN_MEMORY_SORT_LIMIT";
pub const ENV_COMMIT_ROWS: &str = "METAGENOME_COMMIT_ROWS";
pub const ENV_COMMIT_INTERVAL_SECS: &str = "METAGENOME_COMMIT_INTERVAL_SECS";
pub const ENV_DEFAULT_LIMIT: &str = "METAGENOME_DEFAULT_LIMIT";
pub const ENV_KEYWORD_FIELDS: &str = "METAGENOME_KEYWORD_FIELDS";
pub const ENV_TEXT_FIELDS: &str = "METAGENOME_TEXT_FIELDS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "METAGENOME_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sqlite,
    Flatfile,
    Search,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "flatfile" => Ok(Self::Flatfile),
            "search" => Ok(Self::Search),
            other => Err(Error::validation(format!(
                "unknown feature backend '{other}', expected one of [sqlite, flatfile, search]"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub index_dir: PathBuf,
    pub workspace_url: String,
    pub handle_service_url: String,
    pub search_url: Option<String>,
    pub cache_url: Option<String>,
    pub backend: BackendKind,
    pub workers: usize,
    pub metadata_ttl_secs: u64,
    pub metadata_capacity: usize,
    pub lease_timeout_secs: u64,
    pub in_memory_sort_limit: u64,
    pub commit_rows: usize,
    pub commit_interval_secs: u64,
    pub default_limit: u64,
    /// Added to the default keyword fields (`id`, `type`).
    pub keyword_fields: Vec<String>,
    /// Added to the default text fields (`functions`, `functional_descriptions`).
    pub text_fields: Vec<String>,
    pub http_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            index_dir: std::env::temp_dir().join("metagenome-index"),
            workspace_url: String::new(),
            handle_service_url: String::new(),
            search_url: None,
            cache_url: None,
            backend: BackendKind::Sqlite,
            workers: DEFAULT_BUILD_WORKERS,
            metadata_ttl_secs: 600,
            metadata_capacity: DEFAULT_METADATA_CAPACITY,
            lease_timeout_secs: 15 * 60,
            in_memory_sort_limit: DEFAULT_IN_MEMORY_SORT_LIMIT,
            commit_rows: 10_000,
            commit_interval_secs: 30,
            default_limit: DEFAULT_LIMIT,
            keyword_fields: Vec::new(),
            text_fields: Vec::new(),
            http_timeout_secs: 300,
        }
    }
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: usize) -> usize {
    lookup(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_list(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Vec<String> {
    lookup(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_url(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ApiConfig {
    /// Defaults overridden by `METAGENOME_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unparseable numbers fall back to their defaults; an unknown backend
    /// name is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let backend = match lookup(ENV_BACKEND) {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => d.backend,
        };
        Ok(Self {
            index_dir: lookup(ENV_INDEX_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(d.index_dir),
            workspace_url: env_url(&lookup, ENV_WORKSPACE_URL).unwrap_or(d.workspace_url),
            handle_service_url: env_url(&lookup, ENV_HANDLE_SERVICE_URL)
                .unwrap_or(d.handle_service_url),
            search_url: env_url(&lookup, ENV_SEARCH_URL),
            cache_url: env_url(&lookup, ENV_CACHE_URL),
            backend,
            workers: env_usize(&lookup, ENV_WORKERS, d.workers),
            metadata_ttl_secs: env_u64(&lookup, ENV_METADATA_TTL_SECS, d.metadata_ttl_secs),
            metadata_capacity: env_usize(&lookup, ENV_METADATA_CAPACITY, d.metadata_capacity),
            lease_timeout_secs: env_u64(&lookup, ENV_LEASE_TIMEOUT_SECS, d.lease_timeout_secs),
            in_memory_sort_limit: env_u64(
                &lookup,
                ENV_IN_MEMORY_SORT_LIMIT,
                d.in_memory_sort_limit,
            ),
            commit_rows: env_usize(&lookup, ENV_COMMIT_ROWS, d.commit_rows),
            commit_interval_secs: env_u64(
                &lookup,
                ENV_COMMIT_INTERVAL_SECS,
                d.commit_interval_secs,
            ),
            default_limit: env_u64(&lookup, ENV_DEFAULT_LIMIT, d.default_limit),
            keyword_fields: env_list(&lookup, ENV_KEYWORD_FIELDS),
            text_fields: env_list(&lookup, ENV_TEXT_FIELDS),
            http_timeout_secs: env_u64(&lookup, ENV_HTTP_TIMEOUT_SECS, d.http_timeout_secs),
        })
    }

    #[must_use]
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    #[must_use]
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    #[must_use]
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Startup checks. Service URLs are checked only where `remote` is set,
/// since in-process collaborators need none.
pub fn validate_config_contract(config: &ApiConfig, remote: bool) -> Result<()> {
    if config.workers == 0 {
        return Err(Error::validation("workers must be > 0"));
    }
    if config.metadata_ttl_secs == 0 || config.metadata_capacity == 0 {
        return Err(Error::validation("metadata cache ttl and capacity must be > 0"));
    }
    if config.lease_timeout_secs == 0 {
        return Err(Error::validation("build lease timeout must be > 0"));
    }
    if config.commit_rows == 0 || config.commit_interval_secs == 0 {
        return Err(Error::validation("commit rows and interval must be > 0"));
    }
    if config.default_limit == 0 {
        return Err(Error::validation("default limit must be > 0"));
    }
    if config.index_dir.as_os_str().is_empty() {
        return Err(Error::validation("index_dir must be set"));
    }
    metagenome_query::SearchFields::with_extra(&config.keyword_fields, &config.text_fields)?;
    if remote {
        if config.workspace_url.is_empty() {
            return Err(Error::validation("workspace_url must be set"));
        }
        if config.handle_service_url.is_empty() {
            return Err(Error::validation("handle_service_url must be set"));
        }
        if config.backend == BackendKind::Search && config.search_url.is_none() {
            return Err(Error::validation("backend=search requires search_url"));
        }
        if config.http_timeout_secs == 0 {
            return Err(Error::validation("http timeout must be > 0"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            (ENV_BACKEND, "FlatFile"),
            (ENV_WORKERS, "2"),
            (ENV_METADATA_TTL_SECS, "not-a-number"),
            (ENV_TEXT_FIELDS, "contig_id, ,strands"),
            (ENV_INDEX_DIR, "/srv/idx"),
        ]))
        .expect("config");
        assert_eq!(cfg.backend, BackendKind::Flatfile);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.metadata_ttl_secs, 600);
        assert_eq!(cfg.text_fields, ["contig_id", "strands"]);
        assert_eq!(cfg.index_dir, PathBuf::from("/srv/idx"));
        assert_eq!(cfg.default_limit, 50);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[(ENV_BACKEND, "postgres")])).expect_err("bad");
        assert!(err.message.contains("expected one of [sqlite, flatfile, search]"));
    }

    #[test]
    fn contract_checks_limits_and_remote_urls() {
        let cfg = ApiConfig::default();
        assert!(validate_config_contract(&cfg, false).is_ok());
        let err = validate_config_contract(&cfg, true).expect_err("no urls");
        assert!(err.message.contains("workspace_url"));

        let search = ApiConfig {
            workspace_url: "https://ws.example/services/ws".to_string(),
            handle_service_url: "https://ws.example/services/handle".to_string(),
            backend: BackendKind::Search,
            ..ApiConfig::default()
        };
        let err = validate_config_contract(&search, true).expect_err("no search url");
        assert!(err.message.contains("search_url"));

        let zero = ApiConfig {
            workers: 0,
            ..ApiConfig::default()
        };
        assert!(validate_config_contract(&zero, false).is_err());

        let bad_field = ApiConfig {
            keyword_fields: vec!["json".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_config_contract(&bad_field, false).is_err());
    }

    #[test]
    fn config_round_trips_through_json_with_partial_input() {
        let cfg: ApiConfig =
            serde_json::from_str(r#"{"backend": "search", "workers": 8}"#).expect("config");
        assert_eq!(cfg.backend, BackendKind::Search);
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.commit_rows, 10_000);
    }
}
