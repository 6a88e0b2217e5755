//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, the narrow interface the
//! catalog needs from a remote object store: bucket discovery, listing,
//! deletion, and time-limited retrieval URLs.

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "mock")]
pub use self::mock::MockStore;
#[cfg(feature = "s3")]
pub use self::s3::S3Store;
use crate::error::Result;
use crate::models::ObjectInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;
use std::time::Duration;

pub(crate) type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;

/// Unified interface for object stores holding backup buckets.
///
/// Calls are awaited one after another by the catalog; implementations do
/// not need to support concurrent mutation of the same bucket.
///
/// # Examples
///
/// ```
/// use bkm_storage::{ObjectStore, error::Result};
///
/// async fn total_bytes(store: &dyn ObjectStore, bucket: &str) -> Result<u64> {
///     let objects = store.list(bucket).await?;
///     Ok(objects.iter().map(|o| o.size).sum())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Names of all buckets whose name starts with `prefix`, in the order
    /// the store reports them.
    async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>>;

    /// List every object in a bucket.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        self.list_stream(bucket).try_collect().await
    }

    /// Stream object metadata for every object in a bucket.
    ///
    /// Each call starts a fresh listing, so the stream can be requested
    /// again after objects have been deleted.
    ///
    /// # Examples
    ///
    /// ```
    /// use futures::TryStreamExt;
    /// # use bkm_storage::{ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    /// let mut stream = store.list_stream("bkup-web");
    /// while let Some(object) = stream.try_next().await? {
    ///     println!("{}: {} bytes", object.key, object.size);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    fn list_stream<'a>(&'a self, bucket: &'a str) -> ObjectInfoStream<'a>;

    /// Delete a single object.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist and the store is able to tell.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Generate a URL that retrieves the object without credentials until
    /// `expires` has elapsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// # use bkm_storage::{ObjectStore, error::Result};
    /// # async fn example(store: &dyn ObjectStore) -> Result<()> {
    /// let url = store.presign("bkup-web", "web1.4.aa.tar.gpg", Duration::from_secs(86400)).await?;
    /// println!("wget -O part.gpg \"{url}\"");
    /// # Ok(())
    /// # }
    /// ```
    async fn presign(&self, bucket: &str, key: &str, expires: Duration) -> Result<String>;
}
