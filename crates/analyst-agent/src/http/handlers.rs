//! Health and metrics handlers.

use axum::{extract::State, http::header, Json};
use serde_json::{json, Value};

use super::HttpState;

/// Health check endpoint. `status` is `ok` only while serving.
pub async fn health_check(State(state): State<HttpState>) -> Json<Value> {
    let lifecycle = *state.lifecycle.borrow();
    let status = if lifecycle.is_serving() {
        "ok"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": status,
        "service": state.service_name,
        "state": lifecycle.as_str(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(
    State(state): State<HttpState>,
) -> ([(header::HeaderName, &'static str); 1], String) {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
