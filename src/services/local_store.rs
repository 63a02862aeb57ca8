//! src/services/local_store.rs
//!
//! LocalObjectStore: a directory-backed [`ObjectStore`] laid out as
//! `root/{bucket}/{key}`, the same shape MinIO uses in filesystem mode.
//! Used for local development and as the storage fake in tests.

use crate::services::object_store::{ObjectStat, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const HASH_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Directory holding one sub-directory per bucket.
    pub base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects absolute keys, keys with a `..` path segment, backslashes and
    /// control bytes. A `..` inside a file name such as `v1..2.csv` is fine.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.ends_with('/')
            || Path::new(key).components().any(|c| {
                matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
            })
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(StoreError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StoreResult<()> {
        let reject = |reason: &str| -> StoreResult<()> {
            Err(StoreError::InvalidBucketName {
                name: name.to_string(),
                reason: reason.into(),
            })
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return reject("must be between 3 and 63 characters");
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return reject("allowed characters are lowercase letters, digits, dots, and hyphens");
        }

        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return reject("must start and end with a lowercase letter or digit");
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return reject("cannot contain consecutive dots or dot-hyphen combinations");
        }

        if is_ipv4_like(name) {
            return reject("must not be formatted like an IP address");
        }

        Ok(())
    }

    /// Validate `bucket`/`key` and return the payload path. Parent
    /// directories may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;
        Ok(self.base_path.join(bucket).join(key))
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn get(&self, bucket: &str, key: &str, dest: &Path) -> StoreResult<u64> {
        let path = self.object_path(bucket, key)?;
        if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(Self::not_found(bucket, key));
        }

        let written = fs::copy(&path, dest).await?;
        debug!("copied {} -> {} ({} bytes)", path.display(), dest.display(), written);
        Ok(written)
    }

    /// Writes to a temporary file beside the destination and renames it
    /// into place, so readers never observe a partial object.
    async fn put(&self, source: &Path, bucket: &str, key: &str) -> StoreResult<()> {
        let file_path = self.object_path(bucket, key)?;
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = copy_durably(source, &tmp_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!("stored {} as {}", source.display(), file_path.display());
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let path = self.object_path(bucket, key)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(Self::not_found(bucket, key)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Self::not_found(bucket, key));
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        let etag = md5_hex(&path).await?;
        let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);

        Ok(ObjectStat {
            key: key.to_string(),
            size_bytes: meta.len(),
            etag: Some(etag),
            last_modified,
        })
    }
}

/// Copy `source` to `dest` and fsync before returning.
async fn copy_durably(source: &Path, dest: &Path) -> io::Result<()> {
    let mut input = File::open(source).await?;
    let mut output = File::create(dest).await?;
    tokio::io::copy(&mut input, &mut output).await?;
    output.flush().await?;
    output.sync_all().await?;
    Ok(())
}

async fn md5_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut digest = Context::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        digest.consume(&buf[..n]);
    }
    Ok(format!("{:x}", digest.compute()))
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
