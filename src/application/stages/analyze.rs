use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::{
    AnalyzeInput, InferenceClient, InferenceOperation, ObjectStorage, StageError, StageExecutor,
};
use crate::domain::{Analysis, Stage};

use super::RetryPolicy;
use super::response::{into_details, parse};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    summary: String,
    #[serde(default)]
    risk_level: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

pub struct AnalyzeStage {
    inference: Arc<dyn InferenceClient>,
    storage: Arc<dyn ObjectStorage>,
    retry: RetryPolicy,
}

impl AnalyzeStage {
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
impl StageExecutor for AnalyzeStage {
    type Input = AnalyzeInput;
    type Output = Analysis;

    fn stage(&self) -> Stage {
        Stage::Analyze
    }

    async fn execute(&self, input: AnalyzeInput) -> Result<Analysis, StageError> {
        let mut extractions = Vec::with_capacity(input.extraction_results.len());
        for result in &input.extraction_results {
            let raw = self.storage.fetch(&result.artifact_key).await?;
            let data: serde_json::Value = serde_json::from_slice(&raw).map_err(|e| {
                StageError::InvalidInput(format!(
                    "extraction artifact {} is not JSON: {}",
                    result.artifact_key, e
                ))
            })?;
            extractions.push(json!({ "pages": result.pages, "data": data }));
        }

        let payload = json!({
            "insuranceType": input.insurance_type,
            "documentType": input.classification.document_type,
            "extractions": extractions,
        });

        let response: AnalyzeResponse = parse(
            self.retry
                .invoke(self.inference.as_ref(), InferenceOperation::Analyze, payload)
                .await?,
        )?;

        Ok(Analysis {
            summary: response.summary,
            risk_level: response.risk_level,
            details: into_details(response.rest),
        })
    }
}
