use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::{
    ClassifyInput, InferenceClient, InferenceOperation, StageError, StageExecutor,
};
use crate::domain::{Classification, Stage};

use super::RetryPolicy;
use super::response::{into_details, parse};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyResponse {
    document_type: String,
    page_count: u32,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

pub const DEFAULT_MAX_PAGES: u32 = 2000;

pub struct ClassifyStage {
    inference: Arc<dyn InferenceClient>,
    retry: RetryPolicy,
    max_pages: u32,
}

impl ClassifyStage {
    pub fn new(inference: Arc<dyn InferenceClient>, retry: RetryPolicy) -> Self {
        Self {
            inference,
            retry,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Rejects replies reporting more than `max_pages` pages.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

#[async_trait]
impl StageExecutor for ClassifyStage {
    type Input = ClassifyInput;
    type Output = Classification;

    fn stage(&self) -> Stage {
        Stage::Classify
    }

    async fn execute(&self, input: ClassifyInput) -> Result<Classification, StageError> {
        let payload = json!({
            "sourceObjectKey": input.source_object_key,
            "insuranceType": input.insurance_type,
        });

        let response: ClassifyResponse = parse(
            self.retry
                .invoke(self.inference.as_ref(), InferenceOperation::Classify, payload)
                .await?,
        )?;

        if response.document_type.trim().is_empty() {
            return Err(StageError::MalformedResponse(
                "documentType is empty".to_string(),
            ));
        }
        if response.page_count > self.max_pages {
            return Err(StageError::MalformedResponse(format!(
                "pageCount {} exceeds the limit of {}",
                response.page_count, self.max_pages
            )));
        }
        if let Some(confidence) = response.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(StageError::MalformedResponse(format!(
                    "confidence out of range: {}",
                    confidence
                )));
            }
        }

        tracing::debug!(
            document_type = %response.document_type,
            page_count = response.page_count,
            "Document classified"
        );

        Ok(Classification {
            document_type: response.document_type,
            page_count: response.page_count,
            confidence: response.confidence,
            details: into_details(response.rest),
        })
    }
}
