//! Job-side models: the trigger payload sent to the Job Runner, the
//! configuration the Job Runner hands back to the worker, the in-flight
//! [`CompressionJob`] and the [`JobResult`] it produces.

use crate::errors::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fmt,
    path::{Component, Path, PathBuf},
};
use tracing::debug;
use uuid::Uuid;

/// Suffix appended to both the scratch output path and the derived key.
pub const COMPRESSED_SUFFIX: &str = ".gz";

/// Job configuration sent to the Job Runner for one accepted storage event.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TriggerRequest {
    #[serde(rename = "object_name")]
    pub object_key: String,
}

/// Configuration mapping the Job Runner passes to a worker invocation.
///
/// Unknown keys are ignored so runners may add their own bookkeeping.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct JobConf {
    #[serde(default)]
    pub object_name: Option<String>,
}

/// Lifecycle of a [`CompressionJob`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Downloading,
    Compressing,
    Uploading,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Compressing => "compressing",
            JobStatus::Uploading => "uploading",
            JobStatus::CleaningUp => "cleaning_up",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One compress-and-reupload unit of work.
///
/// Scratch paths live under `<scratch_root>/<run_id>/` so concurrent
/// invocations for the same key never share files.
#[derive(Clone, Debug)]
pub struct CompressionJob {
    pub run_id: Uuid,
    pub object_key: String,
    pub source_bucket: String,
    pub dest_bucket: String,
    pub run_dir: PathBuf,
    pub local_input_path: PathBuf,
    pub local_output_path: PathBuf,
    pub derived_key: String,
    pub original_size: u64,
    /// Only meaningful once `status` is [`JobStatus::Done`].
    pub compressed_size: u64,
    pub status: JobStatus,
}

impl CompressionJob {
    /// Plan a job for `object_key`, computing every derived path and key.
    ///
    /// Nothing touches the filesystem here.
    pub fn plan(
        object_key: &str,
        source_bucket: &str,
        dest_bucket: &str,
        scratch_root: &Path,
        run_id: Uuid,
    ) -> Result<Self, JobError> {
        let relative = scratch_relative_path(object_key)?;
        let derived_key = derive_key(object_key)?;

        let run_dir = scratch_root.join(run_id.to_string());
        let local_input_path = run_dir.join(relative);
        let mut output: OsString = local_input_path.clone().into_os_string();
        output.push(COMPRESSED_SUFFIX);

        Ok(Self {
            run_id,
            object_key: object_key.to_string(),
            source_bucket: source_bucket.to_string(),
            dest_bucket: dest_bucket.to_string(),
            run_dir,
            local_input_path,
            local_output_path: PathBuf::from(output),
            derived_key,
            original_size: 0,
            compressed_size: 0,
            status: JobStatus::Pending,
        })
    }

    /// Move the job to `next`, logging the transition.
    pub fn advance(&mut self, next: JobStatus) {
        debug!(
            run_id = %self.run_id,
            object_key = %self.object_key,
            from = %self.status,
            to = %next,
            "job state transition"
        );
        self.status = next;
    }

    /// Build the completion record. Only valid once the job is done.
    pub fn result(&self) -> JobResult {
        JobResult {
            object_name: self.object_key.clone(),
            derived_key: self.derived_key.clone(),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            ratio: compression_ratio(self.original_size, self.compressed_size),
            completed_at: Utc::now(),
        }
    }
}

/// Extract the object key from a Job Runner configuration mapping.
pub fn object_key_from_conf(conf: &JobConf) -> Result<&str, JobError> {
    match conf.object_name.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(key),
        Some(_) => Err(JobError::Configuration(
            "`object_name` in job configuration is empty".into(),
        )),
        None => Err(JobError::Configuration(
            "missing `object_name` in job configuration".into(),
        )),
    }
}

/// Destination key: base name of `object_key` plus [`COMPRESSED_SUFFIX`].
pub fn derive_key(object_key: &str) -> Result<String, JobError> {
    let base = object_key.rsplit('/').next().unwrap_or(object_key);
    if base.is_empty() {
        return Err(JobError::Configuration(format!(
            "object key `{}` has no base name",
            object_key
        )));
    }
    Ok(format!("{}{}", base, COMPRESSED_SUFFIX))
}

/// `original / compressed`, undefined for an empty compressed artifact.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> Option<f64> {
    if compressed_size == 0 {
        None
    } else {
        Some(original_size as f64 / compressed_size as f64)
    }
}

/// Reject keys that would escape the per-run scratch directory.
fn scratch_relative_path(object_key: &str) -> Result<PathBuf, JobError> {
    if object_key.is_empty() {
        return Err(JobError::Configuration("object key is empty".into()));
    }
    let path = Path::new(object_key);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(JobError::Configuration(format!(
                    "object key `{}` cannot be mapped to a scratch path",
                    object_key
                )));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(JobError::Configuration(format!(
            "object key `{}` cannot be mapped to a scratch path",
            object_key
        )));
    }
    Ok(relative)
}

/// Completion metrics for a finished job.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JobResult {
    /// Source object key.
    pub object_name: String,

    /// Key the compressed artifact was uploaded under.
    pub derived_key: String,

    /// Size in bytes of the downloaded object.
    pub original_size: u64,

    /// Size in bytes of the gzip artifact.
    pub compressed_size: u64,

    /// `original_size / compressed_size`; absent when undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,

    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    /// HTML body for the completion notification.
    pub fn summary_html(&self) -> String {
        format!(
            concat!(
                "<h3>File Compression Complete</h3>",
                "<p><strong>Original File:</strong> {}</p>",
                "<p><strong>Original Size:</strong> {} bytes</p>",
                "<p><strong>Compressed Size:</strong> {} bytes</p>"
            ),
            html_escape(&self.object_name),
            self.original_size,
            self.compressed_size
        )
    }
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_request_serializes_as_object_name() {
        let request = TriggerRequest {
            object_key: "report.csv".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({"object_name": "report.csv"}));
    }

    #[test]
    fn derived_key_uses_base_name() {
        assert_eq!(derive_key("report.csv").unwrap(), "report.csv.gz");
        assert_eq!(derive_key("2025/q3/report.csv").unwrap(), "report.csv.gz");
        assert!(derive_key("folder/").is_err());
    }

    #[test]
    fn plan_derives_unique_scratch_paths_per_run() {
        let root = Path::new("/scratch");
        let a = CompressionJob::plan("dir/report.csv", "src", "dst", root, Uuid::new_v4()).unwrap();
        let b = CompressionJob::plan("dir/report.csv", "src", "dst", root, Uuid::new_v4()).unwrap();

        assert_ne!(a.local_input_path, b.local_input_path);
        assert!(a.local_input_path.starts_with(&a.run_dir));
        assert!(a.local_input_path.ends_with("dir/report.csv"));
        assert_eq!(
            a.local_output_path,
            a.run_dir.join("dir").join("report.csv.gz")
        );
        assert_eq!(a.derived_key, "report.csv.gz");
        assert_eq!(a.status, JobStatus::Pending);
    }

    #[test]
    fn plan_rejects_escaping_keys() {
        let root = Path::new("/scratch");
        for key in ["../etc/passwd", "/abs/key", "a/../../b", "", "."] {
            let err = CompressionJob::plan(key, "src", "dst", root, Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, JobError::Configuration(_)), "key {key:?}");
        }
    }

    #[test]
    fn conf_without_object_name_is_configuration_error() {
        let conf: JobConf = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(matches!(
            object_key_from_conf(&conf),
            Err(JobError::Configuration(_))
        ));

        let conf: JobConf = serde_json::from_str(r#"{"object_name": "  "}"#).unwrap();
        assert!(object_key_from_conf(&conf).is_err());

        let conf: JobConf = serde_json::from_str(r#"{"object_name": "a.txt"}"#).unwrap();
        assert_eq!(object_key_from_conf(&conf).unwrap(), "a.txt");
    }

    #[test]
    fn ratio_is_undefined_for_empty_output() {
        assert_eq!(compression_ratio(1000, 0), None);
        assert_eq!(compression_ratio(1000, 250), Some(4.0));
    }

    #[test]
    fn result_omits_undefined_ratio_and_renders_summary() {
        let result = JobResult {
            object_name: "<odd>.csv".into(),
            derived_key: "<odd>.csv.gz".into(),
            original_size: 10,
            compressed_size: 0,
            ratio: None,
            completed_at: Utc::now(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("ratio").is_none());
        assert_eq!(value["object_name"], "<odd>.csv");

        let html = result.summary_html();
        assert!(html.contains("&lt;odd&gt;.csv"));
        assert!(html.contains("10 bytes"));
    }

    #[test]
    fn status_display_matches_serde_names() {
        for status in [JobStatus::CleaningUp, JobStatus::Done, JobStatus::Downloading] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.to_string()));
        }
    }
}
