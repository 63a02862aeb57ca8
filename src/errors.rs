//! Error taxonomy for the relay and the compression worker.
//!
//! Relay errors never reach the HTTP caller; they are logged and absorbed.
//! Worker errors always propagate to the invoker as a failed run.

use crate::{models::job::JobStatus, services::object_store::StoreError};
use reqwest::StatusCode;
use std::io;
use thiserror::Error;

/// A notification body that does not yield exactly one `(bucket, key)` pair.
#[derive(Debug, Error)]
pub enum MalformedEventError {
    #[error("event body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("event body does not match the notification schema: {0}")]
    Schema(String),
    #[error("event contains no records")]
    NoRecords,
    #[error("event record has an empty `{0}`")]
    MissingField(&'static str),
}

/// The Job Runner could not be reached or refused the trigger.
#[derive(Debug, Error)]
pub enum TriggerDispatchError {
    #[error("job runner request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("job runner rejected trigger with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("job runner credentials cannot be sent as a header: {0}")]
    InvalidCredentials(#[from] reqwest::header::InvalidHeaderValue),
}

/// Failure of a single compression invocation.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("scratch space unavailable during {stage}: {source}")]
    Scratch {
        stage: JobStatus,
        #[source]
        source: io::Error,
    },
    #[error("storage access failed during {stage}: {source}")]
    StorageAccess {
        stage: JobStatus,
        #[source]
        source: StoreError,
    },
    #[error("compression failed during {stage}: {reason}")]
    Compression { stage: JobStatus, reason: String },
}

impl JobError {
    /// The job state the failure happened in.
    pub fn stage(&self) -> JobStatus {
        match self {
            JobError::Configuration(_) => JobStatus::Pending,
            JobError::Scratch { stage, .. }
            | JobError::StorageAccess { stage, .. }
            | JobError::Compression { stage, .. } => *stage,
        }
    }

    pub(crate) fn storage(stage: JobStatus, source: StoreError) -> Self {
        JobError::StorageAccess { stage, source }
    }

    pub(crate) fn compression(stage: JobStatus, reason: impl Into<String>) -> Self {
        JobError::Compression {
            stage,
            reason: reason.into(),
        }
    }
}
