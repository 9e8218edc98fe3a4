// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum ErrorCode {
    #[serde(rename = "access_denied")]
    Access,
    #[serde(rename = "not_found")]
    NotFound,
    #[serde(rename = "validation_error")]
    Validation,
    #[serde(rename = "parse_error")]
    Parse,
    #[serde(rename = "backend_unavailable")]
    BackendUnavailable,
    #[serde(rename = "io_error")]
    Io,
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access_denied",
            Self::NotFound => "not_found",
            Self::Validation => "validation_error",
            Self::Parse => "parse_error",
            Self::BackendUnavailable => "backend_unavailable",
            Self::Io => "io_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn access(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Access, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    #[must_use]
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Stored index line that does not decode into its record shape.
    #[must_use]
    pub fn parse_line(kind: &str, line: &str, cause: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Parse,
            format!("error parsing {kind} from: [{line}]; cause: {cause}"),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::internal(format!("serde json error: {value}"))
    }
}

/// Error shape returned across the facade's JSON boundary. `details`
/// names the failing operation and its reference when known.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MachineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl MachineError {
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl From<&Error> for MachineError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            details: BTreeMap::new(),
        }
    }
}

impl From<Error> for MachineError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code,
            message: err.message,
            details: BTreeMap::new(),
        }
    }
}

impl fmt::Display for MachineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MachineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_carry_the_offending_line() {
        let err = Error::parse_line("bin", "a.fasta\tx", "invalid digit found in string");
        assert_eq!(err.code, ErrorCode::Parse);
        assert!(err.message.contains("[a.fasta\tx]"));
        assert!(err.message.contains("invalid digit"));
    }

    #[test]
    fn machine_errors_serialize_stable_code_strings() {
        let machine = MachineError::from(Error::not_found("no bin with id \"b7\""))
            .with_detail("method", "search_contigs_in_bin");
        assert_eq!(machine.to_string(), "not_found: no bin with id \"b7\"");
        let json = serde_json::to_value(&machine).expect("json");
        assert_eq!(json["code"], "not_found");
        assert_eq!(json["details"]["method"], "search_contigs_in_bin");
        let bare = serde_json::to_value(MachineError::from(&Error::validation("x"))).expect("json");
        assert_eq!(bare["code"], "validation_error");
        assert!(bare.get("details").is_none());
    }
}
