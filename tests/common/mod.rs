#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use calendar_assistant::calendar::EventStore;
use calendar_assistant::chat::ChatStore;
use calendar_assistant::domains::chat::ChatTurn;
use calendar_assistant::domains::user::User;
use calendar_assistant::error::{AssistantError, Result};
use calendar_assistant::interfaces::clock::FixedClock;
use calendar_assistant::interfaces::providers::{CompletionOptions, LlmProvider};
use calendar_assistant::providers::memory::ConversationMemory;
use calendar_assistant::services::assistant::{AssistantService, AssistantSettings};

/// Replies from a script, in order, and records every request.
pub struct QueueLlmProvider {
    queue: Mutex<VecDeque<Result<String>>>,
    pub fallback: String,
    pub requests: Mutex<Vec<Vec<ChatTurn>>>,
}

impl QueueLlmProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            queue: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            fallback: "ok".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn last_request(&self) -> Vec<ChatTurn> {
        self.requests
            .lock()
            .await
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn chat_completion(
        &self,
        messages: &[ChatTurn],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.requests.lock().await.push(messages.to_vec());
        let mut guard = self.queue.lock().await;
        guard
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    async fn chat_completion(
        &self,
        _messages: &[ChatTurn],
        _options: &CompletionOptions,
    ) -> Result<String> {
        Err(AssistantError::ExternalService("service unavailable".to_string()))
    }
}

pub struct SlowLlmProvider(pub Duration);

#[async_trait]
impl LlmProvider for SlowLlmProvider {
    async fn chat_completion(
        &self,
        _messages: &[ChatTurn],
        _options: &CompletionOptions,
    ) -> Result<String> {
        tokio::time::sleep(self.0).await;
        Ok("too late".to_string())
    }
}

/// Deletes a chat while the model is thinking, then answers with `reply`.
pub struct ChatDroppingLlmProvider {
    pub chats: Arc<ChatStore>,
    pub owner_id: i32,
    pub chat_id: i32,
    pub reply: String,
}

#[async_trait]
impl LlmProvider for ChatDroppingLlmProvider {
    async fn chat_completion(
        &self,
        _messages: &[ChatTurn],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.chats.delete_chat(self.owner_id, self.chat_id).await?;
        Ok(self.reply.clone())
    }
}

pub fn temp_db() -> (NamedTempFile, String) {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    (file, path)
}

/// Monday 2025-06-16 09:00 UTC, which is 12:00 in Moscow.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap()
}

pub fn moscow_user(id: i32) -> User {
    let mut user = User::new(id, format!("user{id}@example.com"));
    user.timezone = "Europe/Moscow".to_string();
    user
}

pub struct Harness {
    pub assistant: AssistantService,
    pub events: Arc<EventStore>,
    pub chats: Arc<ChatStore>,
    pub clock: Arc<FixedClock>,
    _db: NamedTempFile,
}

pub async fn harness(llm: Arc<dyn LlmProvider>) -> Harness {
    harness_with_settings(llm, AssistantSettings::default()).await
}

pub async fn harness_with_settings(
    llm: Arc<dyn LlmProvider>,
    settings: AssistantSettings,
) -> Harness {
    let (db, path) = temp_db();
    let events = Arc::new(EventStore::new(&path).await.unwrap());
    let chats = Arc::new(ChatStore::new(&path).await.unwrap());
    let memory = Arc::new(ConversationMemory::new(settings.history_limit, 64));
    let clock = Arc::new(FixedClock::new(monday_morning()));
    let assistant = AssistantService::new(
        llm,
        events.clone(),
        chats.clone(),
        memory,
        clock.clone(),
        settings,
    );
    Harness {
        assistant,
        events,
        chats,
        clock,
        _db: db,
    }
}
