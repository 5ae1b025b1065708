use axum::{
    body::Body,
    extract::{Request, State},
    http::Response,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub uptime_seconds: u64,
}

/// Gateway's own status document
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        backend: state.gateway.kind().as_str(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Everything that is not a gateway endpoint goes through the interception pipeline
pub async fn gateway_fallback(State(state): State<AppState>, request: Request) -> Response<Body> {
    state.gateway.handle(request).await
}
