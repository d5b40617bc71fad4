use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domains::chat::ChatTurn;
use crate::error::Result;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Text-completion collaborator. Transient failures surface as
/// `AssistantError::ExternalService`.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_completion(
        &self,
        messages: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<String>;
}
