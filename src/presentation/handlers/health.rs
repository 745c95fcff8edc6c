use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

use super::error_response::error_response;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

/// Ready once the job store answers a trivial query.
pub async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.job_repository.list_recent(1).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ready".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "service not ready")
        }
    }
}
