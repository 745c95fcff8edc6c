use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Job, JobEnvelope, JobError, JobId};
use crate::presentation::state::AppState;

use super::error_response::error_response;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeSummary {
    pub classification: bool,
    pub batch_plan: bool,
    pub batches: usize,
    pub extraction_results: usize,
    pub analysis: bool,
    pub action: bool,
}

impl From<&JobEnvelope> for EnvelopeSummary {
    fn from(envelope: &JobEnvelope) -> Self {
        Self {
            classification: envelope.classification.is_some(),
            batch_plan: envelope.batch_plan.is_some(),
            batches: envelope.batch_plan.as_ref().map_or(0, |plan| plan.len()),
            extraction_results: envelope.extraction_results.as_ref().map_or(0, Vec::len),
            analysis: envelope.analysis.is_some(),
            action: envelope.action.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub original_filename: String,
    pub upload_timestamp: String,
    pub insurance_type: String,
    pub envelope_summary: EnvelopeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status.as_str().to_string(),
            original_filename: job.original_filename.clone(),
            upload_timestamp: job.upload_timestamp.to_rfc3339(),
            insurance_type: job.insurance_type.to_string(),
            envelope_summary: EnvelopeSummary::from(&job.envelope),
            error: job.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<usize>,
}

#[tracing::instrument(skip(state))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match load_job(&state, &job_id).await {
        Ok(job) => (StatusCode::OK, Json(JobStatusResponse::from(&job))).into_response(),
        Err(response) => response,
    }
}

#[tracing::instrument(skip(state))]
pub async fn job_analysis_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let job = match load_job(&state, &job_id).await {
        Ok(job) => job,
        Err(response) => return response,
    };

    match job.envelope.analysis {
        Some(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Analysis not yet available for job {} ({})", job.id, job.status),
        ),
    }
}

#[tracing::instrument(skip(state))]
pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    match state.job_repository.list_recent(limit).await {
        Ok(jobs) => {
            let response: Vec<JobStatusResponse> =
                jobs.iter().map(JobStatusResponse::from).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list jobs");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list jobs: {}", e),
            )
        }
    }
}

async fn load_job(state: &AppState, job_id: &str) -> Result<Job, Response> {
    let uuid = Uuid::parse_str(job_id).map_err(|_| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid job ID: {}", job_id))
    })?;

    match state.job_repository.get_by_id(JobId::from_uuid(uuid)).await {
        Ok(Some(job)) => Ok(job),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", job_id),
        )),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch job");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch job: {}", e),
            ))
        }
    }
}
