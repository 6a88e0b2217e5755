use crate::cache::{BucketCache, BucketListing};
use crate::error::{ErrorKind, Result};
use crate::record::{BackupRecord, Duplicate, HostCatalog, StrayObject};
use bkm_storage::StoreHandle;
use exn::ResultExt;
use futures::TryStreamExt;
use std::ops::AddAssign;
use tracing::instrument;

/// Every backup-bearing bucket folded into one catalog.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub backups: HostCatalog,
    /// Objects that could not be attributed to a backup, in listing order.
    pub strays: Vec<StrayObject>,
    /// `(host, number)` pairs seen in more than one bucket. The bucket
    /// discovered first keeps the record.
    pub duplicates: Vec<Duplicate>,
}

/// Outcome of deleting one or more backups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Objects removed from the store.
    pub deleted: usize,
    /// Objects that would have been removed, had this not been a dry run.
    pub skipped: usize,
    /// Bytes covered by either of the above.
    pub bytes: u64,
}
impl AddAssign for DeletionReport {
    fn add_assign(&mut self, rhs: Self) {
        self.deleted += rhs.deleted;
        self.skipped += rhs.skipped;
        self.bytes += rhs.bytes;
    }
}

/// Backup catalog for one logical run.
///
/// Bucket listings are derived lazily and cached for the lifetime of the
/// catalog. Anything that mutates a host's objects must be followed by
/// [`invalidate`](Self::invalidate) for that host; [`delete`](Self::delete)
/// does this itself.
pub struct Catalog {
    store: StoreHandle,
    bucket_prefix: String,
    cache: BucketCache,
    dry_run: bool,
}
impl Catalog {
    pub fn new(store: StoreHandle, bucket_prefix: impl Into<String>) -> Self {
        Self { store, bucket_prefix: bucket_prefix.into(), cache: BucketCache::default(), dry_run: false }
    }

    /// Count deletions instead of performing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn bucket_prefix(&self) -> &str {
        &self.bucket_prefix
    }

    pub fn cache(&self) -> &BucketCache {
        &self.cache
    }

    /// Names of every backup-bearing bucket, in discovery order.
    pub async fn buckets(&self) -> Result<Vec<String>> {
        self.store.list_buckets(&self.bucket_prefix).await.or_raise(|| ErrorKind::Storage)
    }

    /// The derived listing for one bucket, listing it on first access.
    pub async fn list_bucket(&mut self, bucket: &str) -> Result<&BucketListing> {
        if self.cache.contains(bucket) {
            tracing::trace!(bucket, "Bucket listing served from cache");
        } else {
            let listing = self.fetch(bucket).await?;
            self.cache.insert(listing);
        }
        self.cache.get(bucket).ok_or_else(|| ErrorKind::Storage.into())
    }

    /// Union of every backup-bearing bucket.
    ///
    /// Duplicated `(host, number)` pairs are logged and reported, never
    /// overwritten.
    pub async fn all_backups(&mut self) -> Result<Inventory> {
        let buckets = self.buckets().await?;
        let mut inventory = Inventory::default();
        for bucket in &buckets {
            let listing = self.list_bucket(bucket).await?;
            inventory.strays.extend(listing.strays.iter().cloned());
            for duplicate in inventory.backups.merge(listing.backups.clone()) {
                tracing::warn!(
                    host = %duplicate.hostname,
                    backup = duplicate.number,
                    kept = %duplicate.kept,
                    ignored = %duplicate.ignored,
                    "Backup found in more than one bucket"
                );
                inventory.duplicates.push(duplicate);
            }
        }
        Ok(inventory)
    }

    /// Find a single backup across every bucket.
    pub async fn resolve(&mut self, hostname: &str, number: u64) -> Result<BackupRecord> {
        let inventory = self.all_backups().await?;
        inventory.backups.resolve(hostname, number).cloned()
    }

    /// Forget every cached bucket holding records for `hostname`.
    pub fn invalidate(&mut self, hostname: &str) -> Vec<String> {
        let evicted = self.cache.invalidate(hostname);
        if !evicted.is_empty() {
            tracing::debug!(host = hostname, buckets = ?evicted, "Invalidated cached bucket listings");
        }
        evicted
    }

    /// Delete every object of a backup, data parts first and the
    /// finalization marker last.
    ///
    /// Deletes are independent calls; on failure the objects already removed
    /// stay removed and the host is invalidated so the next read re-lists.
    #[instrument(skip(self, record), fields(host = %record.hostname, backup = record.number, bucket = %record.bucket))]
    pub async fn delete(&mut self, record: &BackupRecord) -> Result<DeletionReport> {
        let mut report = DeletionReport::default();
        for object in record.keys() {
            report.bytes += object.size;
            if self.dry_run {
                tracing::info!(key = %object.key, size = object.size, "Dry run, skipping delete");
                report.skipped += 1;
                continue;
            }
            if let Err(err) = self.store.delete(&record.bucket, &object.key).await {
                self.invalidate(&record.hostname);
                return Err(err).or_raise(|| ErrorKind::Storage);
            }
            tracing::debug!(key = %object.key, "Deleted object");
            report.deleted += 1;
        }
        if !self.dry_run {
            self.invalidate(&record.hostname);
        }
        Ok(report)
    }

    #[instrument(skip(self), fields(store = self.store.name()))]
    async fn fetch(&self, bucket: &str) -> Result<BucketListing> {
        let mut listing = BucketListing::new(bucket);
        let mut objects = self.store.list_stream(bucket);
        while let Some(object) = objects.try_next().await.or_raise(|| ErrorKind::Storage)? {
            listing.fold(object);
        }
        tracing::debug!(records = listing.backups.len(), strays = listing.strays.len(), "Listed bucket");
        Ok(listing)
    }
}
