use async_trait::async_trait;
use serde_json::json;

use crate::application::ports::{InferenceClient, InferenceError, InferenceOperation};

/// Deterministic stand-in for the inference service, used in local mode.
pub struct MockInferenceClient {
    page_count: u32,
}

impl MockInferenceClient {
    pub fn new(page_count: u32) -> Self {
        Self { page_count }
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new(3)
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn invoke(
        &self,
        operation: InferenceOperation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InferenceError> {
        let response = match operation {
            InferenceOperation::Classify => json!({
                "documentType": "APPLICATION",
                "pageCount": self.page_count,
                "confidence": 0.9,
            }),
            InferenceOperation::Extract => json!({
                "pages": payload.get("pages").cloned().unwrap_or_default(),
                "fields": {},
            }),
            InferenceOperation::Analyze => json!({
                "summary": "Mock analysis",
                "riskLevel": "LOW",
            }),
            InferenceOperation::Act => json!({
                "decision": "REFER",
            }),
        };
        Ok(response)
    }
}
