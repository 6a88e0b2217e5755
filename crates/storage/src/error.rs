//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Bucket or object does not exist
    #[display("object not found: {_0}/{_1}")]
    NotFound(#[error(not(source))] String, String),
    /// Bucket does not exist
    #[display("bucket not found: {_0}")]
    BucketNotFound(#[error(not(source))] String),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Network-related error (S3 connections, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Object key or bucket name is empty or contains forbidden bytes
    #[display("invalid key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::BackendError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::NotFound("bkup-web".to_string(), "web1.4.tar.gpg".to_string()).to_string(),
            "object not found: bkup-web/web1.4.tar.gpg"
        );
        assert_eq!(ErrorKind::InvalidKey(String::new()).to_string(), "invalid key: \"\"");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Network("timed out".to_string()).is_retryable());
        assert!(!ErrorKind::BucketNotFound("bkup-web".to_string()).is_retryable());
        assert!(!ErrorKind::PermissionDenied("bkup-web".to_string()).is_retryable());
    }
}
