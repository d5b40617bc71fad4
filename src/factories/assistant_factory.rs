use std::sync::Arc;

use crate::calendar::EventStore;
use crate::chat::ChatStore;
use crate::config::Config;
use crate::error::{AssistantError, Result};
use crate::interfaces::clock::{Clock, SystemClock};
use crate::interfaces::providers::LlmProvider;
use crate::providers::memory::ConversationMemory;
use crate::providers::openai::OpenAiProvider;
use crate::providers::retry::RetryingLlmProvider;
use crate::services::assistant::AssistantService;

pub struct AssistantFactory;

impl AssistantFactory {
    pub async fn create_from_config(config: Config) -> Result<AssistantService> {
        let llm = Self::llm_from_config(&config)?;
        Self::create_with_provider(config, llm, Arc::new(SystemClock)).await
    }

    /// Builds the service around an already constructed model provider and
    /// clock. Stores and memory still come from `config`.
    pub async fn create_with_provider(
        config: Config,
        llm: Arc<dyn LlmProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<AssistantService> {
        let settings = config.assistant_settings()?;
        let sqlite_path = config.sqlite_path();
        let events = Arc::new(EventStore::new(&sqlite_path).await?);
        let chats = Arc::new(ChatStore::new(&sqlite_path).await?);
        let memory = Arc::new(ConversationMemory::new(
            config.max_messages(),
            config.max_conversations(),
        ));
        Ok(AssistantService::new(
            llm, events, chats, memory, clock, settings,
        ))
    }

    pub fn llm_from_config(config: &Config) -> Result<Arc<dyn LlmProvider>> {
        let Some(openai) = config.openai.clone() else {
            return Err(AssistantError::Config(
                "Missing openai configuration".to_string(),
            ));
        };
        let api_key = openai
            .api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                if openai.base_url.is_some() {
                    Some("local".to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| AssistantError::Config("Missing OpenAI API key".to_string()))?;

        let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
            api_key,
            openai.model,
            openai.base_url,
        ));
        match openai.max_retries.unwrap_or(2) {
            0 => Ok(provider),
            retries => Ok(Arc::new(RetryingLlmProvider::new(provider, retries))),
        }
    }
}
