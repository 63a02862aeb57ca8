//! Inbound storage notifications.
//!
//! The storage service redelivers any notification that does not get a
//! 2xx, so this handler answers 200 on every path and only logs what went
//! wrong.

use crate::{
    errors::TriggerDispatchError,
    models::{event::StorageEvent, job::TriggerRequest},
    services::trigger_service::JobTrigger,
};
use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Largest notification body the relay will buffer.
pub const MAX_EVENT_BYTES: usize = 8 * 1024 * 1024;

/// `POST /`: decode the event and trigger one compression job.
///
/// The body is read here rather than through an extractor so an oversized
/// or broken body is logged and still answered with 200.
pub async fn handle_event(State(trigger): State<Arc<dyn JobTrigger>>, body: Body) -> StatusCode {
    let body = match to_bytes(body, MAX_EVENT_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            warn!(
                error = %err,
                limit = MAX_EVENT_BYTES,
                "discarding unreadable storage event body"
            );
            return StatusCode::OK;
        }
    };

    debug!(raw = %String::from_utf8_lossy(&body), "storage event received");

    let event = match StorageEvent::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            warn!(
                error = %err,
                raw = %String::from_utf8_lossy(&body),
                "discarding non-actionable storage event"
            );
            return StatusCode::OK;
        }
    };

    info!(
        bucket = %event.bucket,
        object_key = %event.object_key,
        "storage event accepted"
    );

    let request = TriggerRequest {
        object_key: event.object_key,
    };

    match trigger.trigger(&request).await {
        Ok(ack) => info!(
            object_name = %request.object_key,
            status = %ack.status,
            body = %ack.body,
            "compression job triggered"
        ),
        Err(TriggerDispatchError::Rejected { status, body }) => error!(
            object_name = %request.object_key,
            status = %status,
            body = %body,
            "job runner rejected trigger; event dropped"
        ),
        Err(err) => error!(
            object_name = %request.object_key,
            error = %err,
            "job runner unreachable; event dropped"
        ),
    }

    StatusCode::OK
}
