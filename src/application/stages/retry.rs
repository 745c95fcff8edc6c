use std::time::Duration;

use crate::application::ports::{InferenceClient, InferenceError, InferenceOperation};

/// Upper bound on a single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff applied at the inference boundary of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            factor: 1,
        }
    }

    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            factor: 2,
        }
    }

    /// Sleep before retry number `attempt`, counting from zero.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.factor
            .checked_pow(attempt)
            .and_then(|multiplier| self.base_delay.checked_mul(multiplier))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }

    pub async fn invoke(
        &self,
        client: &dyn InferenceClient,
        operation: InferenceOperation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InferenceError> {
        let mut attempt = 0;

        loop {
            match client.invoke(operation, payload.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        operation = %operation,
                        retries_left = self.max_retries - attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Inference call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
