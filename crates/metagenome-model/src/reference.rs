// SPDX-License-Identifier: Apache-2.0

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const REFERENCE_MAX_LEN: usize = 512;
pub const FINGERPRINT_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    Empty(&'static str),
    Trimmed(&'static str),
    TooLong(&'static str, usize),
    InvalidFormat(&'static str),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty(name) => write!(f, "{name} must not be empty"),
            Self::Trimmed(name) => {
                write!(f, "{name} must not contain leading/trailing whitespace")
            }
            Self::TooLong(name, max) => write!(f, "{name} exceeds max length {max}"),
            Self::InvalidFormat(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for metagenome_core::Error {
    fn from(value: ParseError) -> Self {
        Self::validation(value.to_string())
    }
}

fn check_token(name: &'static str, input: &str, max: usize) -> Result<(), ParseError> {
    if input.is_empty() {
        return Err(ParseError::Empty(name));
    }
    if input.trim() != input {
        return Err(ParseError::Trimmed(name));
    }
    if input.len() > max {
        return Err(ParseError::TooLong(name, max));
    }
    Ok(())
}

/// Versioned object identifier in the remote store, e.g. `12/3/4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl TryFrom<String> for Reference {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.0
    }
}

impl Reference {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_token("ref", input, REFERENCE_MAX_LEN)?;
        if input.contains(':') || input.contains('\0') {
            return Err(ParseError::InvalidFormat(
                "ref must not contain ':' or NUL characters",
            ));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name-safe form used for embedded store names.
    #[must_use]
    pub fn file_key(&self) -> String {
        self.0.replace('/', ":")
    }

    #[cfg(test)]
    pub(crate) fn from_file_key(key: &str) -> Result<Self, ParseError> {
        Self::parse(&key.replace(':', "/"))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content checksum of an object version; keys flat-file artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl TryFrom<String> for Fingerprint {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl Fingerprint {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        check_token("fingerprint", input, FINGERPRINT_MAX_LEN)?;
        if !input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ParseError::InvalidFormat(
                "fingerprint must be alphanumeric (with '-' or '_')",
            ));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub reference: Reference,
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copied_from: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle_id: Option<String>,
}

/// Bin ids are free text; file names carry them as URL-safe base64.
#[must_use]
pub fn encode_bin_key(bin_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(bin_id.as_bytes())
}

#[cfg(test)]
pub(crate) fn decode_bin_key(key: &str) -> Result<String, ParseError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key)
        .map_err(|_| ParseError::InvalidFormat("bin key is not url-safe base64"))?;
    String::from_utf8(bytes).map_err(|_| ParseError::InvalidFormat("bin key is not utf-8"))
}
