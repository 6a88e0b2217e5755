//! Restore Error Types

use derive_more::{Display, Error};

/// A restore error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for restore operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backup has a finalization marker but no data parts to fetch.
    #[display("backup {_1} of host {_0} has no data to restore")]
    EmptyBackup(#[error(not(source))] String, u64),
    #[display("could not generate a download URL")]
    Storage,
    #[display("issue with restore script template")]
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
