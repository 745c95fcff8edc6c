use async_trait::async_trait;

use crate::application::ports::{BatchPlanInput, StageError, StageExecutor};
use crate::domain::{BatchPlan, PageRange, Stage};

/// Splits a document into page ranges of at most `batch_size` pages.
pub struct BatchPlanStage {
    batch_size: u32,
}

impl BatchPlanStage {
    pub fn new(batch_size: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn plan(&self, page_count: u32) -> BatchPlan {
        let ranges = (1..=page_count)
            .step_by(self.batch_size as usize)
            .map(|start| {
                PageRange::new(start, start.saturating_add(self.batch_size - 1).min(page_count))
            })
            .collect();
        BatchPlan { ranges }
    }
}

#[async_trait]
impl StageExecutor for BatchPlanStage {
    type Input = BatchPlanInput;
    type Output = BatchPlan;

    fn stage(&self) -> Stage {
        Stage::BatchPlan
    }

    async fn execute(&self, input: BatchPlanInput) -> Result<BatchPlan, StageError> {
        let plan = self.plan(input.classification.page_count);
        if plan.is_empty() {
            return Err(StageError::InvalidInput(
                "document has no pages to extract".to_string(),
            ));
        }
        tracing::debug!(
            batches = plan.len(),
            batch_size = self.batch_size,
            "Batch plan generated"
        );
        Ok(plan)
    }
}
