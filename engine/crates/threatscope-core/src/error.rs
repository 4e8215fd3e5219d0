//! Error types for ThreatScope

use thiserror::Error;

/// Result type alias using ThreatScope Error
pub type Result<T> = std::result::Result<T, Error>;

/// ThreatScope error types
#[derive(Error, Debug)]
pub enum Error {
    // === Ingestion Errors ===
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // === Store Errors ===
    #[error("Host not found: {address}")]
    HostNotFound { address: String },

    #[error("Host already exists: {address}")]
    HostExists { address: String },

    #[error("Record {record_id} not found on host {address}")]
    RecordNotFound { address: String, record_id: String },

    #[error("Evidence #{index} not found on record {record_id}")]
    EvidenceNotFound { record_id: String, index: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the failure is confined to a single document and the rest of a
    /// batch may proceed
    pub fn is_document_local(&self) -> bool {
        matches!(self, Error::MalformedInput(_) | Error::Io(_))
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "MALFORMED_INPUT",
            Error::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
            Error::HostNotFound { .. } => "HOST_NOT_FOUND",
            Error::HostExists { .. } => "HOST_EXISTS",
            Error::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Error::EvidenceNotFound { .. } => "EVIDENCE_NOT_FOUND",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Other(_) => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::MalformedInput("bad".into()).code(),
            "MALFORMED_INPUT"
        );
        assert_eq!(
            Error::HostNotFound {
                address: "10.0.0.1".into()
            }
            .code(),
            "HOST_NOT_FOUND"
        );
    }

    #[test]
    fn test_document_local() {
        assert!(Error::MalformedInput("x".into()).is_document_local());
        assert!(!Error::InvalidSnapshot("x".into()).is_document_local());
    }
}
