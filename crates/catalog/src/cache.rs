//! Per-bucket listing cache.

use crate::error::ErrorKind;
use crate::record::{HostCatalog, StrayObject, StrayReason};
use bkm_storage::ObjectInfo;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Everything derived from one listing of one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketListing {
    pub bucket: String,
    pub backups: HostCatalog,
    pub strays: Vec<StrayObject>,
}
impl BucketListing {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), ..Default::default() }
    }

    /// Fold one listed object, setting it aside as a stray when its name
    /// can't be attributed to a backup.
    pub fn fold(&mut self, object: ObjectInfo) {
        let err = match self.backups.fold(&self.bucket, object.clone()) {
            Ok(()) => return,
            Err(err) => err,
        };
        let kind: &ErrorKind = &err;
        tracing::warn!(bucket = %self.bucket, key = %object.key, reason = %kind, "Ignoring stray object");
        let reason = StrayReason::from(kind);
        self.strays.push(StrayObject { bucket: self.bucket.clone(), object, reason });
    }
}

/// Listings already derived during this run, keyed by bucket name.
///
/// Populated lazily by [`Catalog`](crate::Catalog); the only way to evict
/// anything is [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct BucketCache {
    listings: HashMap<String, BucketListing>,
}
impl BucketCache {
    pub fn get(&self, bucket: &str) -> Option<&BucketListing> {
        self.listings.get(bucket)
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.listings.contains_key(bucket)
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Drop every cached bucket holding records for `hostname`, returning
    /// the evicted bucket names.
    pub fn invalidate(&mut self, hostname: &str) -> Vec<String> {
        let mut evicted: Vec<String> = self
            .listings
            .iter()
            .filter(|(_, listing)| listing.backups.contains_host(hostname))
            .map(|(bucket, _)| bucket.clone())
            .collect();
        evicted.sort();
        for bucket in &evicted {
            self.listings.remove(bucket);
        }
        evicted
    }

    pub(crate) fn insert(&mut self, listing: BucketListing) -> &BucketListing {
        match self.listings.entry(listing.bucket.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(listing);
                entry.into_mut()
            },
            Entry::Vacant(entry) => entry.insert(listing),
        }
    }
}
