//! Defines the relay's HTTP surface.
//!
//! - `GET  /health`: liveness
//! - `POST /`: storage-event notification sink (always 200)

use crate::{
    handlers::{event_handlers::handle_event, health_handlers::health},
    services::trigger_service::JobTrigger,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the relay router around the given Job Runner trigger.
pub fn routes(trigger: Arc<dyn JobTrigger>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", post(handle_event))
        // `handle_event` enforces its own limit and still answers 200.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(trigger)
}
