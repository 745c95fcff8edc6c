use std::collections::BTreeSet;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    JobRepository, ObjectStorage, ObjectStorageError, RepositoryError,
};
use crate::domain::{Job, JobId, ObjectKey};

pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Cold-storage representation of a reclaimed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveDocument {
    pub format_version: u32,
    pub archived_at: DateTime<Utc>,
    pub job: Job,
    /// Cold-store keys of the copied extraction artifacts.
    #[serde(default)]
    pub artifacts: Vec<ObjectKey>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub archived: usize,
    pub already_archived: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("archive of job {job_id} failed: {source}")]
    Archive {
        job_id: JobId,
        source: ObjectStorageError,
    },
    #[error("archive of job {0} could not be serialized: {1}")]
    Serialization(JobId, String),
    #[error("cleanup of job {job_id} failed: {source}")]
    Cleanup {
        job_id: JobId,
        source: ObjectStorageError,
    },
}

/// Daily run time, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    at: NaiveTime,
}

impl SweepSchedule {
    pub fn daily_at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|at| Self { at })
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.at).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            at: NaiveTime::MIN + Duration::hours(2),
        }
    }
}

enum Reclaimed {
    Archived,
    AlreadyArchived,
}

/// Archives terminal jobs past the retention window, then deletes their live
/// records and objects.
pub struct RetentionSweep {
    job_repository: Arc<dyn JobRepository>,
    live_storage: Arc<dyn ObjectStorage>,
    archive_storage: Arc<dyn ObjectStorage>,
    retention: Duration,
}

impl RetentionSweep {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        live_storage: Arc<dyn ObjectStorage>,
        archive_storage: Arc<dyn ObjectStorage>,
        retention_days: u32,
    ) -> Self {
        Self {
            job_repository,
            live_storage,
            archive_storage,
            retention: Duration::days(i64::from(retention_days)),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        let cutoff = now - self.retention;
        let candidates = self.job_repository.list_terminal_before(cutoff).await?;
        let mut report = SweepReport::default();

        for job in candidates {
            if !job.status.is_terminal() {
                tracing::warn!(job_id = %job.id, status = %job.status, "Skipping non-terminal job");
                continue;
            }
            report.examined += 1;

            match self.reclaim(&job, now).await {
                Ok(reclaimed) => {
                    match reclaimed {
                        Reclaimed::Archived => report.archived += 1,
                        Reclaimed::AlreadyArchived => report.already_archived += 1,
                    }
                    report.deleted += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(job_id = %job.id, error = %e, "Job reclamation failed");
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            archived = report.archived,
            already_archived = report.already_archived,
            deleted = report.deleted,
            failed = report.failed,
            "Retention sweep finished"
        );
        Ok(report)
    }

    /// Runs `run_once` at every scheduled instant, forever.
    pub async fn run_on_schedule(self: Arc<Self>, schedule: SweepSchedule) {
        loop {
            let now = Utc::now();
            let next = schedule.next_after(now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next_run = %next, "Retention sweep scheduled");
            tokio::time::sleep(wait).await;

            if let Err(e) = self.run_once(Utc::now()).await {
                tracing::error!(error = %e, "Retention sweep aborted");
            }
        }
    }

    async fn reclaim(&self, job: &Job, now: DateTime<Utc>) -> Result<Reclaimed, SweepError> {
        let live_artifacts = self.live_artifact_keys(job).await?;
        let artifacts = self.archive_artifacts(job, &live_artifacts).await?;
        let reclaimed = self.ensure_archived(job, artifacts, now).await?;
        self.delete_live_objects(job, &live_artifacts).await?;
        self.job_repository.delete(job.id).await?;
        tracing::info!(job_id = %job.id, status = %job.status, "Job archived and deleted");
        Ok(reclaimed)
    }

    /// Artifacts named by the envelope plus any stray ones under the job's prefix.
    async fn live_artifact_keys(&self, job: &Job) -> Result<BTreeSet<ObjectKey>, SweepError> {
        let mut keys: BTreeSet<ObjectKey> = job.envelope.artifact_keys().into_iter().collect();
        keys.extend(
            self.live_storage
                .list(&ObjectKey::extraction_prefix(&job.id))
                .await
                .map_err(|source| SweepError::Archive {
                    job_id: job.id,
                    source,
                })?,
        );
        Ok(keys)
    }

    async fn archive_artifacts(
        &self,
        job: &Job,
        live_artifacts: &BTreeSet<ObjectKey>,
    ) -> Result<Vec<ObjectKey>, SweepError> {
        let archive_error = |source| SweepError::Archive {
            job_id: job.id,
            source,
        };
        let mut archived = Vec::with_capacity(live_artifacts.len());

        for live_key in live_artifacts {
            let key = ObjectKey::archived_artifact(&job.id, live_key);
            if self.archive_storage.exists(&key).await.map_err(archive_error)? {
                archived.push(key);
                continue;
            }

            let data = match self.live_storage.fetch(live_key).await {
                Ok(data) => data,
                Err(ObjectStorageError::NotFound(_)) => {
                    tracing::warn!(job_id = %job.id, artifact = %live_key, "Artifact missing from live storage");
                    continue;
                }
                Err(e) => return Err(archive_error(e)),
            };
            self.put_confirmed(&key, data).await.map_err(archive_error)?;
            archived.push(key);
        }
        Ok(archived)
    }

    /// The document is written last and marks the archive as complete.
    async fn ensure_archived(
        &self,
        job: &Job,
        artifacts: Vec<ObjectKey>,
        now: DateTime<Utc>,
    ) -> Result<Reclaimed, SweepError> {
        let key = ObjectKey::archive(&job.id);
        let archive_error = |source| SweepError::Archive {
            job_id: job.id,
            source,
        };

        if self.archive_storage.exists(&key).await.map_err(archive_error)? {
            tracing::debug!(job_id = %job.id, archive = %key, "Archive already present");
            return Ok(Reclaimed::AlreadyArchived);
        }

        let document = ArchiveDocument {
            format_version: ARCHIVE_FORMAT_VERSION,
            archived_at: now,
            job: job.clone(),
            artifacts,
        };
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| SweepError::Serialization(job.id, e.to_string()))?;

        self.put_confirmed(&key, Bytes::from(body))
            .await
            .map_err(archive_error)?;
        Ok(Reclaimed::Archived)
    }

    async fn put_confirmed(&self, key: &ObjectKey, body: Bytes) -> Result<(), ObjectStorageError> {
        let expected = body.len() as u64;
        self.archive_storage.put(key, body).await?;

        let stored = self.archive_storage.head(key).await?;
        if stored != expected {
            return Err(ObjectStorageError::UploadFailed(format!(
                "archive {} has {} bytes, expected {}",
                key, stored, expected
            )));
        }
        Ok(())
    }

    async fn delete_live_objects(
        &self,
        job: &Job,
        live_artifacts: &BTreeSet<ObjectKey>,
    ) -> Result<(), SweepError> {
        let keys = live_artifacts
            .iter()
            .chain(std::iter::once(&job.source_object_key));

        for key in keys {
            match self.live_storage.delete(key).await {
                Ok(()) | Err(ObjectStorageError::NotFound(_)) => {}
                Err(source) => {
                    return Err(SweepError::Cleanup {
                        job_id: job.id,
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}
