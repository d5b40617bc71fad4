use async_trait::async_trait;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use tracing::debug;

use crate::domains::chat::{ChatTurn, Role};
use crate::error::{AssistantError, Result};
use crate::interfaces::providers::{CompletionOptions, LlmProvider};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            model,
            client: Client::with_config(config),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
        let message = match turn.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| AssistantError::Runtime(e.to_string()))?,
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        turn.content.clone(),
                    ))
                    .build()
                    .map_err(|e| AssistantError::Runtime(e.to_string()))?,
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| AssistantError::Runtime(e.to_string()))?,
            ),
        };
        Ok(message)
    }

    fn extract_text_from_response(response: &CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .first()
            .ok_or_else(|| AssistantError::ExternalService("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(message)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        messages: &[ChatTurn],
        options: &CompletionOptions,
    ) -> Result<String> {
        let messages = messages
            .iter()
            .map(Self::build_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .build()
            .map_err(|e| AssistantError::Runtime(e.to_string()))?;

        debug!(model = %self.model, "requesting chat completion");
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AssistantError::ExternalService(e.to_string()))?;

        Self::extract_text_from_response(&response)
    }
}
