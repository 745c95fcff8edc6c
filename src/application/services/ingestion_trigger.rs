use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};

use crate::application::ports::{JobRepository, RepositoryError};
use crate::domain::{InsuranceType, Job, JobError, JobId, JobStatus, JobUpdate, ObjectKey};

use super::ExecutionRequest;

const SUPPORTED_EXTENSION: &str = "pdf";
const DISPATCH_STAGE: &str = "Dispatch";

/// A new-document-available notification from the object store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSignal {
    pub object_key: String,
    pub category: String,
}

#[derive(Debug)]
pub enum IngestionOutcome {
    Started(Job),
    /// A job for the same object was created within the dedupe window.
    Duplicate(Job),
}

impl IngestionOutcome {
    pub fn job(&self) -> &Job {
        match self {
            IngestionOutcome::Started(job) | IngestionOutcome::Duplicate(job) => job,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchIngestionReport {
    pub started: Vec<JobId>,
    pub duplicates: Vec<JobId>,
    pub errors: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("object key is empty")]
    EmptyObjectKey,
    #[error("object {0} is not under the upload prefix")]
    NotAnUpload(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("{0}")]
    UnsupportedCategory(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("could not dispatch job {job_id}: {reason}")]
    DispatchFailed { job_id: JobId, reason: String },
}

impl IngestionError {
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            IngestionError::EmptyObjectKey
                | IngestionError::NotAnUpload(_)
                | IngestionError::UnsupportedFileType(_)
                | IngestionError::UnsupportedCategory(_)
        )
    }
}

/// Turns ingestion signals into job records and execution requests.
pub struct IngestionTrigger {
    job_repository: Arc<dyn JobRepository>,
    sender: mpsc::Sender<ExecutionRequest>,
    dedupe_window: Duration,
    admission: Mutex<()>,
}

impl IngestionTrigger {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        sender: mpsc::Sender<ExecutionRequest>,
        dedupe_window: Duration,
    ) -> Self {
        Self {
            job_repository,
            sender,
            dedupe_window,
            admission: Mutex::new(()),
        }
    }

    #[tracing::instrument(skip(self), fields(object_key = %signal.object_key, category = %signal.category))]
    pub async fn handle(&self, signal: IngestionSignal) -> Result<IngestionOutcome, IngestionError> {
        let (key, insurance_type) = validate(&signal)?;

        let job = {
            let _admission = self.admission.lock().await;

            if let Some(existing) = self.job_repository.find_latest_by_source_key(&key).await? {
                if Utc::now() - existing.created_at < self.dedupe_window {
                    tracing::info!(
                        job_id = %existing.id,
                        status = %existing.status,
                        "Duplicate ingestion signal ignored"
                    );
                    return Ok(IngestionOutcome::Duplicate(existing));
                }
            }

            let job = Job::new(key, insurance_type);
            self.job_repository.create(&job).await?;
            job
        };

        if let Err(e) = self.sender.send(ExecutionRequest { job_id: job.id }).await {
            let reason = e.to_string();
            tracing::error!(job_id = %job.id, error = %reason, "Failed to dispatch pipeline execution");
            let update = JobUpdate::fail(JobError::new(DISPATCH_STAGE, reason.clone()));
            self.job_repository
                .transition(job.id, JobStatus::Created, &update)
                .await?;
            return Err(IngestionError::DispatchFailed {
                job_id: job.id,
                reason,
            });
        }

        tracing::info!(
            job_id = %job.id,
            filename = %job.original_filename,
            "Pipeline execution requested"
        );
        Ok(IngestionOutcome::Started(job))
    }

    /// Handles every signal independently; one bad record never blocks the rest.
    pub async fn handle_batch(&self, signals: Vec<IngestionSignal>) -> BatchIngestionReport {
        let mut report = BatchIngestionReport::default();
        for signal in signals {
            let object_key = signal.object_key.clone();
            match self.handle(signal).await {
                Ok(IngestionOutcome::Started(job)) => report.started.push(job.id),
                Ok(IngestionOutcome::Duplicate(job)) => report.duplicates.push(job.id),
                Err(e) => {
                    tracing::warn!(object_key = %object_key, error = %e, "Ingestion signal rejected");
                    report.errors.push((object_key, e.to_string()));
                }
            }
        }
        report
    }
}

fn validate(signal: &IngestionSignal) -> Result<(ObjectKey, InsuranceType), IngestionError> {
    let raw = signal.object_key.trim();
    if raw.is_empty() {
        return Err(IngestionError::EmptyObjectKey);
    }

    let key = ObjectKey::from_raw(raw);
    if !key.is_upload() {
        return Err(IngestionError::NotAnUpload(raw.to_string()));
    }
    if !key.has_extension(SUPPORTED_EXTENSION) {
        return Err(IngestionError::UnsupportedFileType(raw.to_string()));
    }

    let insurance_type = signal
        .category
        .parse::<InsuranceType>()
        .map_err(IngestionError::UnsupportedCategory)?;

    Ok((key, insurance_type))
}
