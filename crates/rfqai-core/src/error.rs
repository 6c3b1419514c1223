//! Error types for the RFQAI ingestion engine.

use thiserror::Error;

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ingestion and reconciliation operations.
///
/// `Request` is the fatal class: the source API was unreachable or rejected
/// the call after retries, which aborts the current table and run. Everything
/// else either degrades to a recorded skip/warning or is surfaced per RFQ.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Source API request failed (after retries for transient classes)
    #[error("Request error: {0}")]
    Request(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// File text extraction failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_request() {
        let err = Error::Request("source unreachable".to_string());
        assert_eq!(err.to_string(), "Request error: source unreachable");
    }

    #[test]
    fn error_display_embedding() {
        let err = Error::Embedding("dim mismatch".to_string());
        assert_eq!(err.to_string(), "Embedding error: dim mismatch");
    }

    #[test]
    fn error_display_config() {
        let err = Error::Config("DATABASE_URL is missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: DATABASE_URL is missing");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
