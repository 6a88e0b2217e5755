//! In-memory object store for testing.

use super::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::key::validate as validate_key;
use crate::models::ObjectInfo;
use crate::ObjectStore;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

type Bucket = BTreeMap<String, (OffsetDateTime, u64)>;

/// In-memory object store for testing.
///
/// Buckets are kept in a [`BTreeMap`] behind a [`RwLock`], so all trait
/// methods can operate on `&self`. Listings are returned in key order, and
/// every successful delete is recorded so tests can assert on exactly which
/// objects were removed.
///
/// # Examples
///
/// ```
/// use bkm_storage::backend::MockStore;
/// use bkm_storage::ObjectStore;
/// use time::OffsetDateTime;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let now = OffsetDateTime::now_utc();
/// let store = MockStore::default().with_object("bkup-web", "web1.1.tar", now);
/// assert_eq!(store.list("bkup-web").await?.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    buckets: RwLock<BTreeMap<String, Bucket>>,
    deleted: RwLock<Vec<(String, String)>>,
}

impl MockStore {
    /// Create a mock store pre-populated with `(bucket, key, modified)`
    /// objects.
    ///
    /// Panics if any bucket or key fails validation. If test setup is wrong,
    /// then the test should not pass.
    pub fn with_objects<B, K>(objects: impl IntoIterator<Item = (B, K, OffsetDateTime)>) -> Self
    where
        B: Into<String>,
        K: Into<String>,
    {
        let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
        for (bucket, key, modified) in objects {
            let (bucket, key) = (bucket.into(), key.into());
            if validate_key(&bucket).is_err() || validate_key(&key).is_err() {
                // The panic here is DELIBERATE. MockStore is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockStore::with_objects: invalid key {bucket}/{key}");
            }
            buckets.entry(bucket).or_default().insert(key, (modified, 0));
        }
        Self {
            name: "mock".to_string(),
            buckets: RwLock::new(buckets),
            deleted: RwLock::new(Vec::new()),
        }
    }

    /// Add one more empty object, builder style.
    pub fn with_object(self, bucket: impl Into<String>, key: impl Into<String>, modified: OffsetDateTime) -> Self {
        self.with_sized_object(bucket, key, modified, 0)
    }

    /// Add one more object of `size` bytes, builder style.
    pub fn with_sized_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        modified: OffsetDateTime,
        size: u64,
    ) -> Self {
        let (bucket, key) = (bucket.into(), key.into());
        if validate_key(&bucket).is_err() || validate_key(&key).is_err() {
            panic!("MockStore::with_sized_object: invalid key {bucket}/{key}");
        }
        self.buckets.get_mut().entry(bucket).or_default().insert(key, (modified, size));
        self
    }

    /// Create an empty bucket, builder style.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.buckets.get_mut().entry(bucket.into()).or_default();
        self
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Every `(bucket, key)` successfully deleted so far, in call order.
    pub async fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.read().await.clone()
    }
}
impl Default for MockStore {
    fn default() -> Self {
        let objects: [(&str, &str, OffsetDateTime); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>> {
        let guard = self.buckets.read().await;
        Ok(guard.keys().filter(|name| name.starts_with(prefix)).cloned().collect())
    }

    fn list_stream<'a>(&'a self, bucket: &'a str) -> ObjectInfoStream<'a> {
        Box::pin(stream! {
            // Snapshot the bucket under the read lock, then drop it before
            // yielding to avoid holding the lock across yield points.
            let entries: Option<Vec<ObjectInfo>> = {
                let guard = self.buckets.read().await;
                guard.get(bucket).map(|objects| {
                    objects
                        .iter()
                        .map(|(key, (modified, size))| ObjectInfo::new(key.clone(), *size, *modified))
                        .collect()
                })
            };
            match entries {
                Some(entries) => {
                    for object in entries {
                        yield Ok(object);
                    }
                },
                None => yield Err(exn::Exn::from(ErrorKind::BucketNotFound(bucket.to_string()))),
            }
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        let mut guard = self.buckets.write().await;
        let objects = guard.get_mut(bucket).ok_or_else(|| exn::Exn::from(ErrorKind::BucketNotFound(bucket.to_string())))?;
        objects
            .remove(key)
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(bucket.to_string(), key.to_string())))?;
        self.deleted.write().await.push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn presign(&self, bucket: &str, key: &str, expires: Duration) -> Result<String> {
        let key = validate_key(key)?;
        let guard = self.buckets.read().await;
        let exists = guard.get(bucket).is_some_and(|objects| objects.contains_key(key));
        if !exists {
            exn::bail!(ErrorKind::NotFound(bucket.to_string(), key.to_string()));
        }
        Ok(format!("https://mock.invalid/{bucket}/{key}?expires={}", expires.as_secs()))
    }
}
