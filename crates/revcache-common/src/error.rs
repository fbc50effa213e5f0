//! Error types for the revision cache
//!
//! This module defines the common error type returned by cache operations,
//! loaders and document sources.

use thiserror::Error;

/// Common result type for revision cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the revision cache
///
/// The type is `Clone` because a failed load is recorded in its cache entry
/// and handed to every caller that was waiting on that load.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Caller errors
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Lookup errors
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("revision not found: {doc_id}/{rev_id}")]
    RevisionNotFound { doc_id: String, rev_id: String },

    // Backing store errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("request timeout")]
    Timeout,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Create an invalid usage error (a caller broke an API precondition)
    pub fn invalid_usage(msg: impl Into<String>) -> Self {
        Self::InvalidUsage(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a revision not found error
    pub fn revision_not_found(doc_id: impl Into<String>, rev_id: impl Into<String>) -> Self {
        Self::RevisionNotFound {
            doc_id: doc_id.into(),
            rev_id: rev_id.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this error reports a broken API precondition
    #[must_use]
    pub fn is_invalid_usage(&self) -> bool {
        matches!(self, Self::InvalidUsage(_))
    }

    /// Check if this is a retryable error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ServiceUnavailable(_) | Self::Storage(_)
        )
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound(_) | Self::RevisionNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::invalid_usage("empty doc id").is_invalid_usage());
        assert!(!Error::storage("disk").is_invalid_usage());
        assert!(!Error::invalid_argument("bad").is_invalid_usage());
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::ServiceUnavailable("test".into()).is_retryable());
        assert!(Error::storage("io").is_retryable());
        assert!(!Error::invalid_usage("test").is_retryable());
    }

    #[test]
    fn test_error_not_found() {
        assert!(Error::DocumentNotFound("doc1".into()).is_not_found());
        assert!(Error::revision_not_found("doc1", "1-a").is_not_found());
        assert!(!Error::internal("test").is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = Error::revision_not_found("doc1", "2-b");
        assert_eq!(err.to_string(), "revision not found: doc1/2-b");
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
