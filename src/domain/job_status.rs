use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a job. Each non-terminal status after `Created` names the
/// stage currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Classifying,
    Batching,
    Extracting,
    Analyzing,
    Acting,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Classifying => "CLASSIFYING",
            JobStatus::Batching => "BATCHING",
            JobStatus::Extracting => "EXTRACTING",
            JobStatus::Analyzing => "ANALYZING",
            JobStatus::Acting => "ACTING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// The status that follows this one on the success path.
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Created => Some(JobStatus::Classifying),
            JobStatus::Classifying => Some(JobStatus::Batching),
            JobStatus::Batching => Some(JobStatus::Extracting),
            JobStatus::Extracting => Some(JobStatus::Analyzing),
            JobStatus::Analyzing => Some(JobStatus::Acting),
            JobStatus::Acting => Some(JobStatus::Complete),
            JobStatus::Complete | JobStatus::Failed => None,
        }
    }

    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == JobStatus::Failed || self.next() == Some(target)
    }

    pub const ALL: [JobStatus; 8] = [
        JobStatus::Created,
        JobStatus::Classifying,
        JobStatus::Batching,
        JobStatus::Extracting,
        JobStatus::Analyzing,
        JobStatus::Acting,
        JobStatus::Complete,
        JobStatus::Failed,
    ];
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid job status: {}", s))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
