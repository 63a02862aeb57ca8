//! src/services/compression_service.rs
//!
//! CompressionWorker is the job body the Job Runner invokes for each
//! accepted storage event. It runs download → gzip → upload → verify and
//! then always removes the run's scratch directory.

use crate::{
    config::WorkerConfig,
    errors::JobError,
    models::job::{CompressionJob, JobConf, JobResult, JobStatus, object_key_from_conf},
    services::object_store::{ObjectStore, StoreError},
};
use flate2::{Compression, write::GzEncoder};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct CompressionWorker {
    config: WorkerConfig,
    store: Arc<dyn ObjectStore>,
}

impl CompressionWorker {
    pub fn new(config: WorkerConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Run a job from the Job Runner's configuration mapping.
    pub async fn run_conf(&self, conf: &JobConf) -> Result<JobResult, JobError> {
        let object_key = object_key_from_conf(conf)?;
        self.run(object_key).await
    }

    /// Compress `object_key` from the source bucket into the destination bucket.
    ///
    /// Configuration problems fail before any scratch file or network call.
    /// Every later failure still removes the run's scratch directory.
    pub async fn run(&self, object_key: &str) -> Result<JobResult, JobError> {
        let mut job = CompressionJob::plan(
            object_key,
            &self.config.source_bucket,
            &self.config.dest_bucket,
            &self.config.scratch_dir,
            Uuid::new_v4(),
        )?;

        info!(
            run_id = %job.run_id,
            object_key = %job.object_key,
            source = %format!("{}/{}", job.source_bucket, job.object_key),
            dest = %format!("{}/{}", job.dest_bucket, job.derived_key),
            backend = self.store.backend(),
            "starting compression job"
        );

        let scratch = ScratchDir::create(&job.run_dir)
            .await
            .map_err(|source| JobError::Scratch {
                stage: JobStatus::Pending,
                source,
            })?;

        let outcome = self.execute(&mut job).await;

        job.advance(JobStatus::CleaningUp);
        scratch.remove().await;

        match outcome {
            Ok(()) => {
                job.advance(JobStatus::Done);
                let result = job.result();
                info!(
                    run_id = %job.run_id,
                    object_name = %result.object_name,
                    derived_key = %result.derived_key,
                    original_size = result.original_size,
                    compressed_size = result.compressed_size,
                    ratio = result.ratio.unwrap_or_default(),
                    "compression job complete"
                );
                Ok(result)
            }
            Err(err) => {
                job.advance(JobStatus::Failed);
                error!(
                    run_id = %job.run_id,
                    object_key = %job.object_key,
                    stage = %err.stage(),
                    error = %err,
                    "compression job failed"
                );
                Err(err)
            }
        }
    }

    async fn execute(&self, job: &mut CompressionJob) -> Result<(), JobError> {
        job.advance(JobStatus::Downloading);
        if let Some(parent) = job.local_input_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| JobError::Scratch {
                    stage: JobStatus::Downloading,
                    source,
                })?;
        }
        self.store
            .get(&job.source_bucket, &job.object_key, &job.local_input_path)
            .await
            .map_err(|err| JobError::storage(JobStatus::Downloading, err))?;
        job.original_size = fs::metadata(&job.local_input_path)
            .await
            .map_err(|source| JobError::Scratch {
                stage: JobStatus::Downloading,
                source,
            })?
            .len();
        info!(run_id = %job.run_id, bytes = job.original_size, "downloaded source object");

        job.advance(JobStatus::Compressing);
        job.compressed_size = gzip_file(&job.local_input_path, &job.local_output_path).await?;
        if job.compressed_size == 0 {
            return Err(JobError::compression(
                JobStatus::Compressing,
                "compressed output is empty",
            ));
        }
        info!(run_id = %job.run_id, bytes = job.compressed_size, "compressed object");

        job.advance(JobStatus::Uploading);
        self.store
            .put(&job.local_output_path, &job.dest_bucket, &job.derived_key)
            .await
            .map_err(|err| JobError::storage(JobStatus::Uploading, err))?;

        let stored = self
            .store
            .stat(&job.dest_bucket, &job.derived_key)
            .await
            .map_err(|err| JobError::storage(JobStatus::Uploading, err))?;
        if stored.size_bytes != job.compressed_size {
            return Err(JobError::storage(
                JobStatus::Uploading,
                StoreError::Backend(format!(
                    "stored object is {} bytes, expected {}",
                    stored.size_bytes, job.compressed_size
                )),
            ));
        }
        info!(
            run_id = %job.run_id,
            key = %job.derived_key,
            etag = stored.etag.as_deref().unwrap_or("-"),
            last_modified = ?stored.last_modified,
            "uploaded compressed object"
        );

        Ok(())
    }
}

/// Gzip `input` into `output`, returning the size of `output`.
///
/// The encoder is synchronous, so it runs on the blocking pool.
pub async fn gzip_file(input: &Path, output: &Path) -> Result<u64, JobError> {
    let (input, output) = (input.to_path_buf(), output.to_path_buf());
    tokio::task::spawn_blocking(move || gzip_blocking(&input, &output))
        .await
        .map_err(|err| {
            JobError::compression(JobStatus::Compressing, format!("encoder task failed: {}", err))
        })?
        .map_err(|err| JobError::compression(JobStatus::Compressing, err.to_string()))
}

fn gzip_blocking(input: &Path, output: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(input)?);
    let writer = BufWriter::new(File::create(output)?);
    let mut encoder = GzEncoder::new(writer, Compression::best());
    io::copy(&mut reader, &mut encoder)?;
    let mut writer = encoder.finish()?;
    writer.flush()?;
    drop(writer);
    Ok(std::fs::metadata(output)?.len())
}

/// Per-run scratch directory, removed on every exit path.
///
/// [`ScratchDir::remove`] is the normal path. If the invocation future is
/// dropped first (runner cancellation, panic), `Drop` removes it instead.
struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    async fn create(path: &Path) -> io::Result<Self> {
        fs::create_dir_all(path).await?;
        debug!("created scratch directory {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            removed: false,
        })
    }

    async fn remove(mut self) {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("removed scratch directory {}", self.path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove scratch directory {}: {}",
                self.path.display(),
                err
            ),
        }
        self.removed = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
