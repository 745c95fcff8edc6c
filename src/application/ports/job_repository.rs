use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Job, JobId, JobStatus, JobUpdate, ObjectKey};

use super::RepositoryError;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Most recently created job for an uploaded object, if any.
    async fn find_latest_by_source_key(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Job>, RepositoryError>;

    /// Atomically applies `update` if the job is still in `expected`.
    ///
    /// Status, envelope and error are written in one operation. Fails with
    /// `Conflict` when another writer moved the job first and with
    /// `InvalidTransition` when the target is not reachable from `expected`.
    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<Job, RepositoryError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, RepositoryError>;

    /// Terminal jobs whose terminal timestamp is older than `cutoff`.
    async fn list_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError>;
}

pub(crate) fn check_transition(
    expected: JobStatus,
    update: &JobUpdate,
) -> Result<(), RepositoryError> {
    if expected.can_transition_to(update.status) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidTransition {
            from: expected,
            to: update.status,
        })
    }
}
