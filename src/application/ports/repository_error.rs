use crate::domain::{JobId, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("query failed: {0}")]
    QueryFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("job {job_id} is {actual}, expected {expected}")]
    Conflict {
        job_id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },
    #[error("illegal transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}
