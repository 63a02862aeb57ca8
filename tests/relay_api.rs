//! Router-level tests for the storage-event relay.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use object_compressor::{
    errors::TriggerDispatchError,
    handlers::event_handlers::MAX_EVENT_BYTES,
    models::job::TriggerRequest,
    routes::routes::routes,
    services::trigger_service::{JobTrigger, TriggerAck},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records every trigger request and answers with a fixed outcome.
#[derive(Default)]
struct RecordingTrigger {
    requests: Mutex<Vec<TriggerRequest>>,
    reject: bool,
}

impl RecordingTrigger {
    fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<TriggerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobTrigger for RecordingTrigger {
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerAck, TriggerDispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.reject {
            Err(TriggerDispatchError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                body: r#"{"title": "Unauthorized"}"#.into(),
            })
        } else {
            Ok(TriggerAck {
                status: StatusCode::OK,
                body: r#"{"state": "queued"}"#.into(),
            })
        }
    }
}

fn app(trigger: Arc<RecordingTrigger>) -> Router {
    routes(trigger)
}

async fn post_event(app: Router, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn health_reports_healthy() {
    let response = app(Arc::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({"status": "healthy"}));
}

#[tokio::test]
async fn well_formed_event_triggers_exactly_one_job() {
    let trigger = Arc::new(RecordingTrigger::default());
    let (status, body) = post_event(
        app(trigger.clone()),
        r#"{"Records":[{"s3":{"bucket":{"name":"testing-files"},"object":{"key":"report.csv"}}}]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(
        trigger.requests(),
        vec![TriggerRequest {
            object_key: "report.csv".into()
        }]
    );
}

#[tokio::test]
async fn event_without_records_is_absorbed() {
    let trigger = Arc::new(RecordingTrigger::default());
    let (status, body) = post_event(app(trigger.clone()), "{}").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(trigger.requests().is_empty());
}

#[tokio::test]
async fn malformed_bodies_never_trigger() {
    let trigger = Arc::new(RecordingTrigger::default());
    let bodies = [
        "",
        "not json",
        r#"{"Records": []}"#,
        r#"{"Records": [{"s3": {"bucket": {"name": "testing-files"}}}]}"#,
        r#"{"Records": [{"s3": {"bucket": {"name": "testing-files"}, "object": {"key": 7}}}]}"#,
        r#"{"Records": "nope"}"#,
    ];
    for body in bodies {
        let (status, _) = post_event(app(trigger.clone()), body).await;
        assert_eq!(status, StatusCode::OK, "body {body:?}");
    }
    assert!(trigger.requests().is_empty());
}

#[tokio::test]
async fn rejected_trigger_still_answers_ok() {
    let trigger = Arc::new(RecordingTrigger::rejecting());
    let (status, _) = post_event(
        app(trigger.clone()),
        r#"{"Records":[{"s3":{"bucket":{"name":"testing-files"},"object":{"key":"a/b.txt"}}}]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(trigger.requests().len(), 1);
    assert_eq!(trigger.requests()[0].object_key, "a/b.txt");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = app(Arc::default())
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A Scenario-A envelope with `padding` bytes of user metadata attached.
fn padded_event(padding: usize) -> String {
    serde_json::json!({
        "Records": [{
            "s3": {
                "bucket": {"name": "testing-files"},
                "object": {
                    "key": "report.csv",
                    "userMetadata": {"X-Amz-Meta-Notes": "n".repeat(padding)}
                }
            }
        }]
    })
    .to_string()
}

#[tokio::test]
async fn large_event_within_limit_still_triggers() {
    let trigger = Arc::new(RecordingTrigger::default());
    let body = padded_event(3 * 1024 * 1024);
    assert!(body.len() > 2 * 1024 * 1024);

    let (status, _) = post_event(app(trigger.clone()), body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(trigger.requests().len(), 1);
    assert_eq!(trigger.requests()[0].object_key, "report.csv");
}

#[tokio::test]
async fn oversized_event_is_absorbed_without_trigger() {
    let trigger = Arc::new(RecordingTrigger::default());
    let body = padded_event(MAX_EVENT_BYTES + 1024);

    let (status, body) = post_event(app(trigger.clone()), body).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(trigger.requests().is_empty());
}
