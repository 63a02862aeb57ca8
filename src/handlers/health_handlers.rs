//! Liveness handler.
//!
//! - GET /health -> `{"status": "healthy"}`

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /health`
///
/// Always 200; the relay holds no state whose health could degrade.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".into(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}
