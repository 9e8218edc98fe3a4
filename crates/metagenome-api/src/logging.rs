// SPDX-License-Identifier: Apache-2.0

use metagenome_core::{Error, Result, ENV_METAGENOME_LOG_FORMAT, ENV_METAGENOME_LOG_LEVEL};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Filter from `METAGENOME_LOG_LEVEL`, then `RUST_LOG`, then `info`.
#[must_use]
pub fn env_filter() -> EnvFilter {
    std::env::var(ENV_METAGENOME_LOG_LEVEL)
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs the global subscriber; `METAGENOME_LOG_FORMAT=json` selects
/// JSON lines. Fails when a subscriber is already installed.
pub fn init() -> Result<()> {
    let format = std::env::var(ENV_METAGENOME_LOG_FORMAT)
        .map(|v| LogFormat::parse(&v))
        .unwrap_or(LogFormat::Text);
    init_with(env_filter(), format)
}

pub fn init_with(filter: EnvFilter, format: LogFormat) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter);
    let outcome = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    outcome.map_err(|e| Error::internal(format!("failed to install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_text() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Text);
    }

    #[test]
    fn second_init_reports_an_error() {
        let _ = init_with(EnvFilter::new("warn"), LogFormat::Json);
        let second = init_with(EnvFilter::new("warn"), LogFormat::Text);
        assert!(second.is_err());
    }
}
