//! Catalog Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A catalog error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
///
/// ### Non-fatal
/// - [`ErrorKind::MalformedKey`] and [`ErrorKind::StrayKey`] are produced by
///   the key parser and end up as [`StrayObject`](crate::StrayObject)
///   diagnostics; listing carries on.
///
/// ### Fatal to the request
/// - [`ErrorKind::HostNotFound`], [`ErrorKind::BackupNotFound`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Storage`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Object name does not follow the backup naming grammar.
    #[display("malformed backup key: {_0}")]
    MalformedKey(#[error(not(source))] String),
    /// Finalization marker with no hostname or backup number left to attach to.
    #[display("stray finalization marker: {_0}")]
    StrayKey(#[error(not(source))] String),
    #[display("no backups found for host: {_0}")]
    HostNotFound(#[error(not(source))] String),
    #[display("backup {_1} not found for host {_0}")]
    BackupNotFound(#[error(not(source))] String, u64),
    /// A listing or delete against the object store failed.
    #[display("object store operation failed")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
