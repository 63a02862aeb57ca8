//! Storage notifications emitted by the object store on object creation.
//!
//! Providers wrap the interesting part (`s3.bucket.name`, `s3.object.key`)
//! in an envelope whose casing varies between `Records` and `records`. The
//! envelope is decoded into typed structs; anything that does not yield a
//! single `(bucket, key)` pair is a [`MalformedEventError`].

use crate::errors::MalformedEventError;
use serde::Deserialize;
use serde_json::Value;

/// A decoded, actionable storage event.
#[derive(Debug, Clone)]
pub struct StorageEvent {
    /// Bucket the object was created in.
    pub bucket: String,

    /// Key of the created object, as delivered by the provider.
    pub object_key: String,

    /// Full notification payload, kept for diagnostics only.
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Records", alias = "records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(alias = "S3")]
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    #[serde(alias = "Bucket")]
    bucket: BucketEntity,
    #[serde(alias = "Object")]
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    #[serde(alias = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    #[serde(alias = "Key")]
    key: String,
}

impl StorageEvent {
    /// Decode a raw notification body.
    ///
    /// Only the first record is acted on; providers deliver one record per
    /// object-created notification.
    pub fn from_slice(body: &[u8]) -> Result<Self, MalformedEventError> {
        let raw: Value = serde_json::from_slice(body).map_err(MalformedEventError::InvalidJson)?;
        Self::from_value(raw)
    }

    /// Decode an already-parsed notification payload.
    pub fn from_value(raw: Value) -> Result<Self, MalformedEventError> {
        let envelope = NotificationEnvelope::deserialize(&raw)
            .map_err(|err| MalformedEventError::Schema(err.to_string()))?;

        let record = envelope
            .records
            .into_iter()
            .next()
            .ok_or(MalformedEventError::NoRecords)?;

        if record.s3.bucket.name.is_empty() {
            return Err(MalformedEventError::MissingField("s3.bucket.name"));
        }
        if record.s3.object.key.is_empty() {
            return Err(MalformedEventError::MissingField("s3.object.key"));
        }

        Ok(Self {
            bucket: record.s3.bucket.name,
            object_key: record.s3.object.key,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minio_put_event() {
        let body = br#"{"Records":[{"s3":{"bucket":{"name":"testing-files"},"object":{"key":"report.csv"}}}]}"#;
        let event = StorageEvent::from_slice(body).unwrap();
        assert_eq!(event.bucket, "testing-files");
        assert_eq!(event.object_key, "report.csv");
        assert!(event.raw["Records"].is_array());
    }

    #[test]
    fn tolerates_lowercase_envelope_and_extra_fields() {
        let raw = json!({
            "EventName": "s3:ObjectCreated:Put",
            "Key": "testing-files/nested/data.bin",
            "records": [{
                "eventVersion": "2.0",
                "s3": {
                    "bucket": {"name": "testing-files", "arn": "arn:aws:s3:::testing-files"},
                    "object": {"key": "nested/data.bin", "size": 42}
                }
            }]
        });
        let event = StorageEvent::from_value(raw).unwrap();
        assert_eq!(event.object_key, "nested/data.bin");
    }

    #[test]
    fn empty_object_has_no_records() {
        let err = StorageEvent::from_slice(b"{}").unwrap_err();
        assert!(matches!(err, MalformedEventError::NoRecords));
    }

    #[test]
    fn rejects_non_json_body() {
        let err = StorageEvent::from_slice(b"not json at all").unwrap_err();
        assert!(matches!(err, MalformedEventError::InvalidJson(_)));
    }

    #[test]
    fn rejects_record_without_object_key() {
        let raw = json!({"Records": [{"s3": {"bucket": {"name": "testing-files"}, "object": {}}}]});
        let err = StorageEvent::from_value(raw).unwrap_err();
        assert!(matches!(err, MalformedEventError::Schema(_)));
    }

    #[test]
    fn rejects_empty_key() {
        let raw = json!({"Records": [{"s3": {"bucket": {"name": "b"}, "object": {"key": ""}}}]});
        let err = StorageEvent::from_value(raw).unwrap_err();
        assert!(matches!(err, MalformedEventError::MissingField("s3.object.key")));
    }

    #[test]
    fn rejects_json_array_body() {
        let err = StorageEvent::from_slice(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, MalformedEventError::Schema(_)));
    }
}
