//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A command error with automatic location tracking.
pub(crate) type Error = exn::Exn<ErrorKind>;
/// Result type alias for command execution.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub(crate) enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("store credentials are not configured (set store.key_id and store.key_secret)")]
    Credentials,
    #[display("could not start async runtime")]
    Runtime,
    #[display("could not read backup catalog")]
    Catalog,
    #[display("could not build restore script")]
    Restore,
    #[display("could not write output to {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
    #[display("archive command not found: {_0}")]
    TriggerNotFound(#[error(not(source))] String),
    #[display("could not run archive command")]
    Trigger,
    #[display("archive command exited unsuccessfully (code {_0:?})")]
    TriggerFailed(#[error(not(source))] Option<i32>),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Catalog | Self::Trigger)
    }
}
