//! HTTP endpoints that receive object-created event notifications.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::Error;
use crate::pipeline::{EmailDecomposer, ImageConverter};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub decomposer: Arc<EmailDecomposer>,
    pub converter: Arc<ImageConverter>,
}

/// Build the Axum router with the event and health routes.
pub fn event_routes(decomposer: Arc<EmailDecomposer>, converter: Arc<ImageConverter>) -> Router {
    let state = AppState {
        decomposer,
        converter,
    };

    Router::new()
        .route("/health", get(health))
        .route("/events/raw-email", post(raw_email_event))
        .route("/events/image", post(image_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "mailscan"
    }))
}

// ── Event endpoints ─────────────────────────────────────────────────────

async fn raw_email_event(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let invocation = Uuid::new_v4();
    // Stage logs inherit the invocation id through this span.
    let span = info_span!("invocation", id = %invocation);

    async move {
        info!("Raw-email event received");
        match state.decomposer.handle(payload).await {
            Ok(outcomes) => {
                let written: usize = outcomes.iter().map(|o| o.written.len()).sum();
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "invocation": invocation,
                        "processed": outcomes.len(),
                        "attachments_written": written,
                    })),
                )
            }
            Err(e) => invocation_failure(invocation, &e),
        }
    }
    .instrument(span)
    .await
}

async fn image_event(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let invocation = Uuid::new_v4();
    let span = info_span!("invocation", id = %invocation);

    async move {
        info!("Image event received");
        match state.converter.handle(payload).await {
            Ok(outcomes) => (
                StatusCode::OK,
                Json(serde_json::json!({
                    "invocation": invocation,
                    "processed": outcomes.len(),
                })),
            ),
            Err(e) => invocation_failure(invocation, &e),
        }
    }
    .instrument(span)
    .await
}

/// Log the failure and map it to a response.
///
/// Malformed notifications are the caller's fault (422); everything
/// downstream of a valid notification is a 500 so the event source
/// redrives it.
fn invocation_failure(invocation: Uuid, error: &Error) -> (StatusCode, Json<serde_json::Value>) {
    error!(error = %error, "Invocation failed");

    let status = match error {
        Error::Notification(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "invocation": invocation,
            "error": error.to_string(),
        })),
    )
}
