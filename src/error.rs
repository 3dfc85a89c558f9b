//! Error taxonomy shared by every ragchat operation.
//!
//! All failures surface synchronously to the immediate caller. The
//! surrounding layer (CLI, HTTP, ...) decides how each kind is presented,
//! e.g. [`RagError::NotFound`] as a 404.

use thiserror::Error;

/// Errors returned by the ingestion and generation pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    /// A referenced file, chat, or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-range caller input (non-positive `k`, empty
    /// query text, mismatched chat id on append, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An assembled message sequence violates the current-turn contract.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A loader, extractor, or record parser could not read the input.
    #[error("ingestion failed: {0}")]
    IngestionFailure(String),

    /// The vector store, embedding provider, language model, or record
    /// database failed or returned malformed data.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        RagError::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        RagError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        RagError::InvalidState(msg.into())
    }

    pub fn ingestion(msg: impl Into<String>) -> Self {
        RagError::IngestionFailure(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        RagError::UpstreamFailure(msg.into())
    }
}

impl From<reqwest::Error> for RagError {
    fn from(e: reqwest::Error) -> Self {
        RagError::UpstreamFailure(e.to_string())
    }
}

impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        RagError::UpstreamFailure(format!("database: {}", e))
    }
}

impl From<std::io::Error> for RagError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => RagError::NotFound(e.to_string()),
            _ => RagError::IngestionFailure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: RagError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn other_io_errors_map_to_ingestion_failure() {
        let err: RagError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, RagError::IngestionFailure(_)));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = RagError::invalid_argument("k must be positive");
        assert_eq!(err.to_string(), "invalid argument: k must be positive");
    }
}
