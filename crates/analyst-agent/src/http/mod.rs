//! HTTP server for health and metrics.
//!
//! Provides endpoints for:
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use analyst_core::LifecycleState;
use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;

mod handlers;

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub service_name: String,
    pub lifecycle: watch::Receiver<LifecycleState>,
    pub metrics: Arc<Metrics>,
    pub started_at: DateTime<Utc>,
}

/// Create the HTTP router.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
