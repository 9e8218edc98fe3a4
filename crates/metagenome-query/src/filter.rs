// SPDX-License-Identifier: Apache-2.0

/// Splits filter text into tokens; `,` and line/tab breaks separate tokens
/// like spaces do. Case is preserved.
#[must_use]
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .replace([',', '\t', '\n', '\r'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Line filter: a line matches when every token is a substring of the
/// lower-cased line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    tokens: Vec<String>,
}

impl Filter {
    #[must_use]
    pub fn parse(query: &str) -> Self {
        Self {
            tokens: tokenize(&query.to_lowercase()),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let lower = line.to_lowercase();
        self.tokens.iter().all(|t| lower.contains(t.as_str()))
    }
}
