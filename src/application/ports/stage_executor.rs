use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    ActionResult, Analysis, BatchPlan, Classification, ExtractionResult, InsuranceType, JobId,
    ObjectKey, PageRange, Stage,
};

use super::{InferenceError, ObjectStorageError};

/// One pipeline stage: a function from its envelope slice to its result.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn stage(&self) -> Stage;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output, StageError>;
}

#[derive(Debug, Clone)]
pub struct ClassifyInput {
    pub source_object_key: ObjectKey,
    pub insurance_type: InsuranceType,
}

#[derive(Debug, Clone)]
pub struct BatchPlanInput {
    pub classification: Classification,
}

#[derive(Debug, Clone)]
pub struct ExtractInput {
    pub job_id: JobId,
    pub batch_index: usize,
    pub pages: PageRange,
    pub source_object_key: ObjectKey,
    pub insurance_type: InsuranceType,
    pub document_type: String,
}

#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub insurance_type: InsuranceType,
    pub classification: Classification,
    pub extraction_results: Vec<ExtractionResult>,
}

#[derive(Debug, Clone)]
pub struct ActInput {
    pub insurance_type: InsuranceType,
    pub analysis: Analysis,
}

pub type ClassifyExecutor = dyn StageExecutor<Input = ClassifyInput, Output = Classification>;
pub type BatchPlanExecutor = dyn StageExecutor<Input = BatchPlanInput, Output = BatchPlan>;
pub type ExtractExecutor = dyn StageExecutor<Input = ExtractInput, Output = ExtractionResult>;
pub type AnalyzeExecutor = dyn StageExecutor<Input = AnalyzeInput, Output = Analysis>;
pub type ActExecutor = dyn StageExecutor<Input = ActInput, Output = ActionResult>;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("inference: {0}")]
    Upstream(#[from] InferenceError),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("object storage: {0}")]
    Storage(#[from] ObjectStorageError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("batch {batch} of {batches}: {source}")]
    BatchFailed {
        batch: usize,
        batches: usize,
        source: Box<StageError>,
    },
    #[error("executor crashed: {0}")]
    Crashed(String),
}
