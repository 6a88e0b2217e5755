//! S3-compatible object store.
//!
//! This module provides an [`ObjectStore`] implementation for S3-compatible
//! services including AWS S3, Backblaze B2, MinIO, and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via the configuration file and handed
//! straight to the SDK; nothing here stores or rotates them.

use crate::{
    ObjectInfo, ObjectStore,
    backend::ObjectInfoStream,
    error::{ErrorKind, Result},
    validate_key,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::DateTime,
};
use exn::ResultExt;
use std::fmt::Debug;
use std::time::Duration;
use time::OffsetDateTime;

/// S3-compatible object store.
///
/// # Examples
///
/// ```no_run
/// use bkm_storage::backend::S3Store;
///
/// let store = S3Store::new(
///     "offsite",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com"),
///     "access_key_id",
///     "secret_access_key",
/// );
/// ```
#[derive(Debug, Clone)]
pub struct S3Store {
    name: String,
    client: Client,
}

impl S3Store {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `name` - A name for this store (used in logging)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        let region = Region::new(region.into());
        let credentials = Credentials::new(key_id, key_secret, None, None, "bkm-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            // Configure retry policy with exponential backoff (1 initial + 3 retries)
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
        }
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    fn map_sdk_error<E, R>(err: &SdkError<E, R>, bucket: &str, key: Option<&str>) -> ErrorKind
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: Debug,
    {
        let message = DisplayErrorContext(err).to_string();
        if matches!(err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) {
            return ErrorKind::Network(message);
        }
        match (err.code(), key) {
            (Some("NoSuchBucket"), _) => ErrorKind::BucketNotFound(bucket.to_string()),
            (Some("NoSuchKey"), Some(key)) => ErrorKind::NotFound(bucket.to_string(), key.to_string()),
            (Some("AccessDenied"), _) => ErrorKind::PermissionDenied(bucket.to_string()),
            _ => ErrorKind::BackendError(message),
        }
    }

    fn object_info(object: &aws_sdk_s3::types::Object) -> Result<ObjectInfo> {
        let key = object.key().ok_or_else(|| exn::Exn::from(ErrorKind::BackendError("listed object without key".to_string())))?;
        let modified = match object.last_modified() {
            Some(dt) => Self::parse_datetime(dt)?,
            None => exn::bail!(ErrorKind::BackendError(format!("listed object without timestamp: {key}"))),
        };
        let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or_default();
        Ok(ObjectInfo::new(key, size, modified))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_buckets(&self, prefix: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(&e, prefix, None))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name())
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect())
    }

    fn list_stream<'a>(&'a self, bucket: &'a str) -> ObjectInfoStream<'a> {
        Box::pin(stream! {
            let mut pages = self.client.list_objects_v2().bucket(bucket).into_paginator().send();
            while let Some(page) = pages.next().await {
                let page = match page {
                    Ok(page) => page,
                    Err(e) => {
                        yield Err(exn::Exn::from(Self::map_sdk_error(&e, bucket, None)));
                        return;
                    },
                };
                tracing::trace!(bucket, objects = page.contents().len(), "Received listing page");
                for object in page.contents() {
                    yield Self::object_info(object);
                }
            }
        })
    }

    /// S3 deletes are idempotent: deleting an absent key succeeds.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let key = validate_key(key)?;
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(&e, bucket, Some(key)))?;
        Ok(())
    }

    async fn presign(&self, bucket: &str, key: &str, expires: Duration) -> Result<String> {
        let key = validate_key(key)?;
        let config = PresigningConfig::expires_in(expires)
            .or_raise(|| ErrorKind::BackendError(format!("invalid URL expiry: {}s", expires.as_secs())))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| Self::map_sdk_error(&e, bucket, Some(key)))?;
        Ok(request.uri().to_string())
    }
}
