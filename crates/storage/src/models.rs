//! Storage models.

use std::cmp::Ordering;
use time::OffsetDateTime;

/// Object metadata returned by bucket listings.
///
/// Immutable once listed. Ordering is by key first so that sets of objects
/// iterate in the same order regardless of how the store returned them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectInfo {
    /// Full object name within its bucket
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, as reported by the store
    pub modified: OffsetDateTime,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64, modified: OffsetDateTime) -> Self {
        Self { key: key.into(), size, modified }
    }
}
impl Ord for ObjectInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.modified.cmp(&other.modified))
            .then_with(|| self.size.cmp(&other.size))
    }
}
impl PartialOrd for ObjectInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
