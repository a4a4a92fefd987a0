use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

use crate::api::router::AppState;

/// Basic health check response
#[derive(serde::Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Store readiness response
#[derive(serde::Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub service: String,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
/// Liveness only; the store is not touched
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "tagstore",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /health/ready
/// Opens and rolls back a store session
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service is not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let start_time = Instant::now();

    let check = tokio::time::timeout(Duration::from_secs(2), state.sessions.begin()).await;
    let response_time = start_time.elapsed();

    match check {
        Ok(Ok(session)) => {
            drop(session);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ready",
                    "service": "tagstore",
                    "store": "connected",
                    "response_time_ms": response_time.as_millis(),
                })),
            )
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness_check_failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "service": "tagstore",
                    "store": "disconnected",
                    "error": "Store session could not be opened",
                    "response_time_ms": response_time.as_millis(),
                })),
            )
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "service": "tagstore",
                "store": "timeout",
                "error": "Store session timed out after 2 seconds",
                "response_time_ms": response_time.as_millis(),
            })),
        ),
    }
}
