mod error_response;
mod health;
mod ingest;
mod job_status;

pub use error_response::ErrorResponse;
pub use health::{health_handler, readiness_handler};
pub use ingest::{IngestResponse, ingest_handler};
pub use job_status::{
    EnvelopeSummary, JobStatusResponse, job_analysis_handler, job_status_handler,
    list_jobs_handler,
};
