use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{JobRepository, RepositoryError, check_transition};
use crate::domain::{
    InsuranceType, Job, JobEnvelope, JobError, JobId, JobStatus, JobUpdate, ObjectKey,
};

const JOB_COLUMNS: &str = "id, status, original_filename, upload_timestamp, insurance_type, \
     source_object_key, envelope, error, created_at, updated_at, completed_at, version";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let query = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.as_ref().map(job_from_row).transpose()
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let query = format!(
            "INSERT INTO jobs ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            JOB_COLUMNS
        );

        sqlx::query(&query)
            .bind(job.id.as_uuid())
            .bind(job.status.as_str())
            .bind(&job.original_filename)
            .bind(job.upload_timestamp)
            .bind(job.insurance_type.as_str())
            .bind(job.source_object_key.as_str())
            .bind(Json(&job.envelope))
            .bind(job.error.as_ref().map(Json))
            .bind(job.created_at)
            .bind(job.updated_at)
            .bind(job.completed_at)
            .bind(job.version)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepositoryError::ConstraintViolation(db.to_string())
                }
                other => query_failed(other),
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        self.fetch_one(id).await
    }

    #[instrument(skip(self), fields(object_key = %key))]
    async fn find_latest_by_source_key(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Job>, RepositoryError> {
        let query = format!(
            "SELECT {} FROM jobs WHERE source_object_key = $1 ORDER BY created_at DESC LIMIT 1",
            JOB_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self, update), fields(job_id = %id, from = %expected, to = %update.status))]
    async fn transition(
        &self,
        id: JobId,
        expected: JobStatus,
        update: &JobUpdate,
    ) -> Result<Job, RepositoryError> {
        check_transition(expected, update)?;

        let mut job = self
            .fetch_one(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        if job.status != expected {
            return Err(RepositoryError::Conflict {
                job_id: id,
                expected,
                actual: job.status,
            });
        }

        let read_version = job.version;
        job.apply(update, Utc::now());

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, envelope = $2, error = $3, updated_at = $4, completed_at = $5,
                version = $6
            WHERE id = $7 AND status = $8 AND version = $9
            "#,
        )
        .bind(job.status.as_str())
        .bind(Json(&job.envelope))
        .bind(job.error.as_ref().map(Json))
        .bind(job.updated_at)
        .bind(job.completed_at)
        .bind(job.version)
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .bind(read_version)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            let actual = self
                .fetch_one(id)
                .await?
                .map(|current| current.status)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
            return Err(RepositoryError::Conflict {
                job_id: id,
                expected,
                actual,
            });
        }

        Ok(job)
    }

    #[instrument(skip(self))]
    async fn list_recent(&self, limit: usize) -> Result<Vec<Job>, RepositoryError> {
        let query = format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC LIMIT $1",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn list_terminal_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Job>, RepositoryError> {
        let query = format!(
            "SELECT {} FROM jobs \
             WHERE status IN ($1, $2) AND COALESCE(completed_at, updated_at) < $3 \
             ORDER BY completed_at ASC",
            JOB_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(JobStatus::Complete.as_str())
            .bind(JobStatus::Failed.as_str())
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed)?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn delete(&self, id: JobId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(result.rows_affected() > 0)
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn job_from_row(row: &PgRow) -> Result<Job, RepositoryError> {
    let status: String = row.try_get("status").map_err(query_failed)?;
    let insurance_type: String = row.try_get("insurance_type").map_err(query_failed)?;
    let source_object_key: String = row.try_get("source_object_key").map_err(query_failed)?;
    let Json(envelope): Json<JobEnvelope> = row.try_get("envelope").map_err(query_failed)?;
    let error: Option<Json<JobError>> = row.try_get("error").map_err(query_failed)?;

    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(query_failed)?),
        status: status
            .parse::<JobStatus>()
            .map_err(RepositoryError::QueryFailed)?,
        original_filename: row.try_get("original_filename").map_err(query_failed)?,
        upload_timestamp: row.try_get("upload_timestamp").map_err(query_failed)?,
        insurance_type: insurance_type
            .parse::<InsuranceType>()
            .map_err(RepositoryError::QueryFailed)?,
        source_object_key: ObjectKey::from_raw(source_object_key),
        envelope,
        error: error.map(|Json(e)| e),
        created_at: row.try_get("created_at").map_err(query_failed)?,
        updated_at: row.try_get("updated_at").map_err(query_failed)?,
        completed_at: row.try_get("completed_at").map_err(query_failed)?,
        version: row.try_get("version").map_err(query_failed)?,
    })
}
