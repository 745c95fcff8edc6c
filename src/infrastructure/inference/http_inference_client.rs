use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::application::ports::{InferenceClient, InferenceError, InferenceOperation};

/// JSON-over-HTTP client: `POST {base_url}/v1/{operation}`.
pub struct HttpInferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    fn endpoint(&self, operation: InferenceOperation) -> String {
        format!("{}/v1/{}", self.base_url, operation.as_str())
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    #[tracing::instrument(skip(self, payload), fields(operation = %operation))]
    async fn invoke(
        &self,
        operation: InferenceOperation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InferenceError> {
        let mut request = self.http.post(self.endpoint(operation)).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(InferenceError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Inference request rejected");
            return Err(InferenceError::ApiRequestFailed(format!("{}: {}", status, body)));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))
    }
}
