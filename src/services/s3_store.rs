//! [`ObjectStore`] backed by any S3-compatible endpoint (MinIO, LocalStack, AWS).

use crate::{
    config::StorageConfig,
    services::object_store::{ObjectStat, ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client as S3Client,
    config::{Builder as S3ConfigBuilder, Credentials, Region},
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime as SmithyDateTime},
};
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, instrument};

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Build a client with static credentials and path-style addressing.
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "object-compressor-static",
        );
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&aws_config)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            "S3 object store initialized"
        );

        Self {
            client: S3Client::from_conf(s3_config),
        }
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    async fn get(&self, bucket: &str, key: &str, dest: &Path) -> StoreResult<u64> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_no_such_key() {
                    Self::not_found(bucket, key)
                } else {
                    StoreError::Backend(DisplayErrorContext(&err).to_string())
                }
            })?;

        let mut reader = output.body.into_async_read();
        let mut file = File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        debug!(bytes = written, "object downloaded");
        Ok(written)
    }

    #[instrument(skip(self, source), fields(source = %source.display()))]
    async fn put(&self, source: &Path, bucket: &str, key: &str) -> StoreResult<()> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|err| StoreError::Backend(DisplayErrorContext(&err).to_string()))?;

        debug!("object uploaded");
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> StoreResult<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let err = err.into_service_error();
                if err.is_not_found() {
                    Self::not_found(bucket, key)
                } else {
                    StoreError::Backend(DisplayErrorContext(&err).to_string())
                }
            })?;

        Ok(ObjectStat {
            key: key.to_string(),
            size_bytes: output
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
            last_modified: output.last_modified().and_then(to_chrono),
        })
    }
}

fn to_chrono(ts: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}
