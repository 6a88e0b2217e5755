//! Backup records and the per-host catalog they are folded into.

use crate::age::Age;
use crate::error::{ErrorKind, Result};
use crate::key::{KeyFragment, KeyRole};
use bkm_storage::ObjectInfo;
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// One backup run of one host, reconstructed from its objects.
///
/// Identified by `(hostname, number)`. A record is finalized once its
/// finalization marker has been observed; the marker is kept so it can be
/// deleted together with the data parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub hostname: String,
    pub number: u64,
    /// Bucket the objects were listed from.
    pub bucket: String,
    data_keys: BTreeSet<ObjectInfo>,
    earliest: Option<OffsetDateTime>,
    finalized_at: Option<OffsetDateTime>,
    finalization_key: Option<ObjectInfo>,
}
impl BackupRecord {
    pub fn new(bucket: impl Into<String>, hostname: impl Into<String>, number: u64) -> Self {
        Self {
            hostname: hostname.into(),
            number,
            bucket: bucket.into(),
            data_keys: BTreeSet::new(),
            earliest: None,
            finalized_at: None,
            finalization_key: None,
        }
    }

    /// Data parts, ordered by key name (which is also reassembly order).
    pub fn data_keys(&self) -> &BTreeSet<ObjectInfo> {
        &self.data_keys
    }

    /// Oldest last-modified timestamp among the data parts.
    pub fn earliest(&self) -> Option<OffsetDateTime> {
        self.earliest
    }

    pub fn finalized_at(&self) -> Option<OffsetDateTime> {
        self.finalized_at
    }

    pub fn finalization_key(&self) -> Option<&ObjectInfo> {
        self.finalization_key.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Seconds between finalization and `now`, or [`Age::InProgress`].
    ///
    /// A marker timestamped after `now` (clock skew) counts as age zero.
    pub fn finalized_age(&self, now: OffsetDateTime) -> Age {
        match self.finalized_at {
            Some(at) => Age::Finalized(u64::try_from((now - at).whole_seconds()).unwrap_or_default()),
            None => Age::InProgress,
        }
    }

    /// Every object belonging to this backup: data parts first, then the
    /// finalization marker.
    pub fn keys(&self) -> impl Iterator<Item = &ObjectInfo> {
        self.data_keys.iter().chain(self.finalization_key.iter())
    }

    /// Total size of the data parts in bytes.
    pub fn size(&self) -> u64 {
        self.data_keys.iter().map(|o| o.size).sum()
    }

    fn add_data_key(&mut self, object: ObjectInfo) {
        self.earliest = Some(match self.earliest {
            Some(earliest) => earliest.min(object.modified),
            None => object.modified,
        });
        self.data_keys.insert(object);
    }

    fn set_finalization_key(&mut self, object: ObjectInfo) {
        if let Some(existing) = &self.finalization_key {
            if *existing == object {
                return;
            }
            tracing::warn!(
                host = %self.hostname,
                backup = self.number,
                first = %existing.key,
                second = %object.key,
                "Backup has more than one finalization marker; keeping the latest"
            );
            // Keep the greatest by (modified, key) so the outcome does not
            // depend on listing order.
            if (existing.modified, &existing.key) >= (object.modified, &object.key) {
                return;
            }
        }
        self.finalized_at = Some(object.modified);
        self.finalization_key = Some(object);
    }
}

/// Why an object was left out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrayReason {
    /// Name does not follow the backup naming grammar.
    Malformed,
    /// Finalization marker with no hostname or backup number.
    OrphanMarker,
}

impl From<&ErrorKind> for StrayReason {
    fn from(kind: &ErrorKind) -> Self {
        match kind {
            ErrorKind::StrayKey(_) => Self::OrphanMarker,
            _ => Self::Malformed,
        }
    }
}

/// An object that was listed but could not be attributed to any backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrayObject {
    pub bucket: String,
    pub object: ObjectInfo,
    pub reason: StrayReason,
}

/// The same `(hostname, number)` pair seen in two buckets.
///
/// The record from `kept` stays in the catalog; `ignored` is reported only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub hostname: String,
    pub number: u64,
    pub kept: String,
    pub ignored: String,
}

/// Backup records grouped by hostname, then backup number.
///
/// Iteration is ordered by hostname, then number, which is the tie-break
/// used wherever hosts are ranked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCatalog {
    hosts: BTreeMap<String, BTreeMap<u64, BackupRecord>>,
}
impl HostCatalog {
    /// Parse an object name and fold it into the matching record.
    ///
    /// Folding is idempotent and order-independent: the same set of objects
    /// always produces the same catalog. Returns the parse error for
    /// objects that don't belong to any backup, leaving the catalog
    /// untouched.
    pub fn fold(&mut self, bucket: &str, object: ObjectInfo) -> Result<()> {
        let fragment: KeyFragment = object.key.parse()?;
        self.insert(bucket, fragment, object);
        Ok(())
    }

    /// Fold an already-parsed fragment, creating the record if needed.
    pub fn insert(&mut self, bucket: &str, fragment: KeyFragment, object: ObjectInfo) {
        let KeyFragment { hostname, backup_number, role } = fragment;
        let record = self
            .hosts
            .entry(hostname.clone())
            .or_default()
            .entry(backup_number)
            .or_insert_with(|| BackupRecord::new(bucket, hostname, backup_number));
        match role {
            KeyRole::Data => record.add_data_key(object),
            KeyRole::FinalizationMarker => record.set_finalization_key(object),
        }
    }

    /// Union `other` into this catalog.
    ///
    /// A `(hostname, number)` pair already present is not overwritten; each
    /// collision is returned so the caller can surface it.
    pub fn merge(&mut self, other: HostCatalog) -> Vec<Duplicate> {
        let mut duplicates = Vec::new();
        for (hostname, records) in other.hosts {
            let existing = self.hosts.entry(hostname).or_default();
            for (number, record) in records {
                match existing.get(&number) {
                    Some(kept) => duplicates.push(Duplicate {
                        hostname: record.hostname.clone(),
                        number,
                        kept: kept.bucket.clone(),
                        ignored: record.bucket,
                    }),
                    None => {
                        existing.insert(number, record);
                    },
                }
            }
        }
        duplicates
    }

    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }

    pub fn contains_host(&self, hostname: &str) -> bool {
        self.hosts.contains_key(hostname)
    }

    /// All records of one host, keyed by backup number.
    pub fn host(&self, hostname: &str) -> Option<&BTreeMap<u64, BackupRecord>> {
        self.hosts.get(hostname)
    }

    pub fn get(&self, hostname: &str, number: u64) -> Option<&BackupRecord> {
        self.hosts.get(hostname).and_then(|records| records.get(&number))
    }

    /// Look up a record a caller asked for by name.
    pub fn resolve(&self, hostname: &str, number: u64) -> Result<&BackupRecord> {
        let Some(records) = self.hosts.get(hostname) else {
            exn::bail!(ErrorKind::HostNotFound(hostname.to_string()));
        };
        records
            .get(&number)
            .ok_or_else(|| ErrorKind::BackupNotFound(hostname.to_string(), number).into())
    }

    /// Every record, ordered by hostname then number.
    pub fn records(&self) -> impl Iterator<Item = &BackupRecord> {
        self.hosts.values().flat_map(BTreeMap::values)
    }

    /// Each host's `(number, age)` pairs, ordered by backup number.
    pub fn backups_by_age(&self, now: OffsetDateTime) -> impl Iterator<Item = (&str, Vec<(u64, Age)>)> {
        self.hosts.iter().map(move |(hostname, records)| {
            let ages = records.values().map(|r| (r.number, r.finalized_age(now))).collect();
            (hostname.as_str(), ages)
        })
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Number of backup records across all hosts.
    pub fn len(&self) -> usize {
        self.hosts.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
