//! Capability-typed object storage client used by the compression worker.
//!
//! The worker only needs three operations: download an object to a local
//! file, upload a local file, and read an object's metadata. Backends
//! implement [`ObjectStore`]; see `s3_store` and `local_store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Metadata returned by [`ObjectStore::stat`].
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub key: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Download `bucket/key` into `dest`, returning the number of bytes written.
    ///
    /// `dest`'s parent directory must already exist.
    async fn get(&self, bucket: &str, key: &str, dest: &Path) -> StoreResult<u64>;

    /// Upload the file at `source` as `bucket/key`, overwriting any existing object.
    async fn put(&self, source: &Path, bucket: &str, key: &str) -> StoreResult<()>;

    /// Fetch metadata for `bucket/key`.
    async fn stat(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat>;
}
