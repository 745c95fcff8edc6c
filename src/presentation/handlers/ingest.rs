use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::services::{IngestionError, IngestionOutcome, IngestionSignal};
use crate::presentation::state::AppState;

use super::error_response::error_response;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub job_id: String,
    pub status: String,
    pub duplicate: bool,
}

#[tracing::instrument(skip_all)]
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(signal): Json<IngestionSignal>,
) -> impl IntoResponse {
    tracing::debug!(object_key = %signal.object_key, category = %signal.category, "Ingestion signal received");

    match state.ingestion_trigger.handle(signal).await {
        Ok(outcome) => {
            let (code, duplicate) = match &outcome {
                IngestionOutcome::Started(_) => (StatusCode::ACCEPTED, false),
                IngestionOutcome::Duplicate(_) => (StatusCode::OK, true),
            };
            let job = outcome.job();
            let response = IngestResponse {
                job_id: job.id.to_string(),
                status: job.status.as_str().to_string(),
                duplicate,
            };
            (code, Json(response)).into_response()
        }
        Err(IngestionError::EmptyObjectKey) => {
            error_response(StatusCode::BAD_REQUEST, IngestionError::EmptyObjectKey.to_string())
        }
        Err(e) if e.is_input_error() => {
            tracing::warn!(error = %e, "Ingestion signal rejected");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e @ IngestionError::DispatchFailed { .. }) => {
            tracing::error!(error = %e, "Pipeline dispatch failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to ingest signal");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to ingest signal: {}", e),
            )
        }
    }
}
