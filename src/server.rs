//! Web server module.
//!
//! Exposes the collected samples in the Prometheus text format.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::exporter::Exporter;

const LANDING_PAGE: &str = r#"<html>
<head><title>Confluent Cloud Exporter</title></head>
<body>
<h1>Confluent Cloud Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>"#;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

async fn landing_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Run (or replay) a collection cycle and render it.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.exporter.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {err}")).into_response()
        }
    }
}
