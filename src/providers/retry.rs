use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::domains::chat::ChatTurn;
use crate::error::{FailureKind, Result};
use crate::interfaces::providers::{CompletionOptions, LlmProvider};

const RETRY_BASE_MS: u64 = 250;

/// Retries transient failures of the wrapped provider with linear backoff.
/// Other errors are returned immediately.
pub struct RetryingLlmProvider {
    inner: Arc<dyn LlmProvider>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingLlmProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(RETRY_BASE_MS),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl LlmProvider for RetryingLlmProvider {
    async fn chat_completion(
        &self,
        messages: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.inner.chat_completion(messages, options).await {
                Ok(text) => return Ok(text),
                Err(err)
                    if err.kind() == FailureKind::ExternalService
                        && attempt <= self.max_retries =>
                {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "chat completion failed, retrying"
                    );
                    tokio::time::sleep(self.base_delay * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
