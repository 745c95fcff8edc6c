use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::{
    ActInput, InferenceClient, InferenceOperation, StageError, StageExecutor,
};
use crate::domain::{ActionResult, Stage};

use super::RetryPolicy;
use super::response::{into_details, parse};

#[derive(Deserialize)]
struct ActResponse {
    decision: String,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

pub struct ActStage {
    inference: Arc<dyn InferenceClient>,
    retry: RetryPolicy,
}

impl ActStage {
    pub fn new(inference: Arc<dyn InferenceClient>, retry: RetryPolicy) -> Self {
        Self { inference, retry }
    }
}

#[async_trait]
impl StageExecutor for ActStage {
    type Input = ActInput;
    type Output = ActionResult;

    fn stage(&self) -> Stage {
        Stage::Act
    }

    async fn execute(&self, input: ActInput) -> Result<ActionResult, StageError> {
        let payload = json!({
            "insuranceType": input.insurance_type,
            "analysis": input.analysis,
        });

        let response: ActResponse = parse(
            self.retry
                .invoke(self.inference.as_ref(), InferenceOperation::Act, payload)
                .await?,
        )?;

        if response.decision.trim().is_empty() {
            return Err(StageError::MalformedResponse("decision is empty".to_string()));
        }

        Ok(ActionResult {
            decision: response.decision,
            details: into_details(response.rest),
        })
    }
}
