use std::fmt;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceOperation {
    Classify,
    Extract,
    Analyze,
    Act,
}

impl InferenceOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceOperation::Classify => "classify",
            InferenceOperation::Extract => "extract",
            InferenceOperation::Analyze => "analyze",
            InferenceOperation::Act => "act",
        }
    }
}

impl fmt::Display for InferenceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless request/response access to the AI inference service.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn invoke(
        &self,
        operation: InferenceOperation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InferenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("transport: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl InferenceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, InferenceError::RateLimited | InferenceError::Transport(_))
    }
}
