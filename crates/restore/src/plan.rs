use crate::error::{ErrorKind, Result};
use bkm_catalog::{BackupRecord, ENCRYPTION_SUFFIX};
use bkm_storage::ObjectStore;
use exn::ResultExt;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// One data part and the URL it can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePart {
    pub key: String,
    pub url: String,
    pub size: u64,
}
impl RestorePart {
    pub fn is_encrypted(&self) -> bool {
        self.key.rsplit_once('.').is_some_and(|(_, ext)| ext == ENCRYPTION_SUFFIX)
    }

    /// Name of the part once decrypted (unchanged for plain parts).
    pub fn archive_name(&self) -> &str {
        match self.key.rsplit_once('.') {
            Some((name, ext)) if ext == ENCRYPTION_SUFFIX => name,
            _ => &self.key,
        }
    }
}

/// Everything needed to fetch and reassemble one backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    pub hostname: String,
    pub number: u64,
    /// Oldest timestamp among the data parts.
    pub created: Option<OffsetDateTime>,
    pub finalized: bool,
    /// After this, the URLs stop working.
    pub expires_at: OffsetDateTime,
    /// Parts in reassembly order.
    pub parts: Vec<RestorePart>,
}
impl RestorePlan {
    /// Presign every data part of `record`, valid for `expiry` from `now`.
    ///
    /// Parts are ordered by key. Split indices sort lexically, so this is
    /// also the order they are concatenated in.
    #[instrument(skip(store, record), fields(host = %record.hostname, backup = record.number))]
    pub async fn build(
        store: &dyn ObjectStore,
        record: &BackupRecord,
        expiry: Duration,
        now: OffsetDateTime,
    ) -> Result<Self> {
        if record.data_keys().is_empty() {
            exn::bail!(ErrorKind::EmptyBackup(record.hostname.clone(), record.number));
        }
        if !record.is_finalized() {
            tracing::warn!("Backup is not finalized, restored data may be incomplete");
        }
        let mut parts = Vec::with_capacity(record.data_keys().len());
        for object in record.data_keys() {
            let url = store.presign(&record.bucket, &object.key, expiry).await.or_raise(|| ErrorKind::Storage)?;
            parts.push(RestorePart { key: object.key.clone(), url, size: object.size });
        }
        Ok(Self {
            hostname: record.hostname.clone(),
            number: record.number,
            created: record.earliest(),
            finalized: record.is_finalized(),
            expires_at: now + expiry,
            parts,
        })
    }

    /// Total size of every part in bytes.
    pub fn size(&self) -> u64 {
        self.parts.iter().map(|p| p.size).sum()
    }
}
