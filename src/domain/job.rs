use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InsuranceType, JobEnvelope, JobId, JobStatus, ObjectKey};

/// Failure details recorded on a `Failed` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub stage: String,
    pub cause: String,
}

impl JobError {
    pub fn new(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub original_filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub insurance_type: InsuranceType,
    pub source_object_key: ObjectKey,
    pub envelope: JobEnvelope,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Job {
    pub fn new(source_object_key: ObjectKey, insurance_type: InsuranceType) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            status: JobStatus::Created,
            original_filename: source_object_key.file_name().to_string(),
            upload_timestamp: now,
            insurance_type,
            envelope: JobEnvelope::seed(source_object_key.clone(), insurance_type),
            source_object_key,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        }
    }

    /// Applies a transition in memory. Callers persist the result atomically.
    pub fn apply(&mut self, update: &JobUpdate, now: DateTime<Utc>) {
        self.status = update.status;
        if let Some(envelope) = &update.envelope {
            self.envelope = envelope.clone();
        }
        if update.status == JobStatus::Failed {
            self.error = update.error.clone();
        }
        if update.status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        self.version += 1;
    }
}

/// One status transition together with the envelope it commits.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub envelope: Option<JobEnvelope>,
    pub error: Option<JobError>,
}

impl JobUpdate {
    pub fn advance(status: JobStatus, envelope: JobEnvelope) -> Self {
        Self {
            status,
            envelope: Some(envelope),
            error: None,
        }
    }

    pub fn claim(status: JobStatus) -> Self {
        Self {
            status,
            envelope: None,
            error: None,
        }
    }

    pub fn fail(error: JobError) -> Self {
        Self {
            status: JobStatus::Failed,
            envelope: None,
            error: Some(error),
        }
    }
}
