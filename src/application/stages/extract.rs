use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use crate::application::ports::{
    ExtractInput, InferenceClient, InferenceOperation, ObjectStorage, StageError, StageExecutor,
};
use crate::domain::{ExtractionResult, ObjectKey, Stage};

use super::RetryPolicy;

/// Extracts one page range and stores the result as a JSON artifact.
pub struct ExtractStage {
    inference: Arc<dyn InferenceClient>,
    storage: Arc<dyn ObjectStorage>,
    retry: RetryPolicy,
}

impl ExtractStage {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        storage: Arc<dyn ObjectStorage>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inference,
            storage,
            retry,
        }
    }
}

#[async_trait]
impl StageExecutor for ExtractStage {
    type Input = ExtractInput;
    type Output = ExtractionResult;

    fn stage(&self) -> Stage {
        Stage::Extract
    }

    async fn execute(&self, input: ExtractInput) -> Result<ExtractionResult, StageError> {
        let payload = json!({
            "sourceObjectKey": input.source_object_key,
            "insuranceType": input.insurance_type,
            "documentType": input.document_type,
            "pages": input.pages,
        });

        let response = self
            .retry
            .invoke(self.inference.as_ref(), InferenceOperation::Extract, payload)
            .await?;

        let field_count = match &response {
            serde_json::Value::Object(fields) => fields.len(),
            other => {
                return Err(StageError::MalformedResponse(format!(
                    "expected an object, got {}",
                    json_kind(other)
                )));
            }
        };

        let artifact_key = ObjectKey::extraction_artifact(&input.job_id, &input.pages);
        let body = serde_json::to_vec(&response)
            .map_err(|e| StageError::MalformedResponse(e.to_string()))?;
        self.storage.put(&artifact_key, Bytes::from(body)).await?;

        tracing::debug!(
            batch_index = input.batch_index,
            start = input.pages.start,
            end = input.pages.end,
            artifact = %artifact_key,
            "Batch extracted"
        );

        Ok(ExtractionResult {
            batch_index: input.batch_index,
            pages: input.pages,
            artifact_key,
            field_count,
        })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
