use std::fmt;

use serde::{Deserialize, Serialize};

use super::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Classify,
    BatchPlan,
    Extract,
    Analyze,
    Act,
}

impl Stage {
    pub const SEQUENCE: [Stage; 5] = [
        Stage::Classify,
        Stage::BatchPlan,
        Stage::Extract,
        Stage::Analyze,
        Stage::Act,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Classify => "Classify",
            Stage::BatchPlan => "Batch-Plan",
            Stage::Extract => "Extract",
            Stage::Analyze => "Analyze",
            Stage::Act => "Act",
        }
    }

    /// Status a job carries while this stage runs.
    pub fn running_status(&self) -> JobStatus {
        match self {
            Stage::Classify => JobStatus::Classifying,
            Stage::BatchPlan => JobStatus::Batching,
            Stage::Extract => JobStatus::Extracting,
            Stage::Analyze => JobStatus::Analyzing,
            Stage::Act => JobStatus::Acting,
        }
    }

    /// Status committed together with this stage's output.
    pub fn completed_status(&self) -> JobStatus {
        match self {
            Stage::Classify => JobStatus::Batching,
            Stage::BatchPlan => JobStatus::Extracting,
            Stage::Extract => JobStatus::Analyzing,
            Stage::Analyze => JobStatus::Acting,
            Stage::Act => JobStatus::Complete,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
