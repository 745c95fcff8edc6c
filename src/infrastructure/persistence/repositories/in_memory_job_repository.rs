use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::ports::{JobRepository, RepositoryError, check_transition};
use crate::domain::{Job, JobId, JobStatus, JobUpdate, ObjectKey};

/// Process-local job store. Each transition is a compare-and-set under one
/// write lock.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record as-is, bypassing lifecycle checks.
    pub async fn insert_raw(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_latest_by_source_key(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Job>, RepositoryError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| &job.source_object_key == key)
            .max_by_key(|job| job.created_at)
            .cloned())
    }

    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<Job, RepositoryError> {
        check_transition(expected, update)?;

        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if job.status != expected {
            return Err(RepositoryError::Conflict {
                job_id: id,
                expected,
                actual: job.status,
            });
        }

        job.apply(update, Utc::now());
        Ok(job.clone())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn list_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| job.completed_at.unwrap_or(job.updated_at) < cutoff)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.completed_at);
        Ok(jobs)
    }

    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
