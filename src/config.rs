use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use chrono::NaiveTime;

use crate::error::{AssistantError, Result};
use crate::interfaces::providers::CompletionOptions;
use crate::services::assistant::AssistantSettings;

pub const DEFAULT_DB_PATH: &str = "./data/calendar-assistant.db";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MemoryConfig {
    pub max_messages: Option<usize>,
    pub max_conversations: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// "HH:MM", local to each user.
    pub workday_start: Option<String>,
    pub workday_end: Option<String>,
    pub min_slot_minutes: Option<i64>,
    pub free_slot_days: Option<i64>,
    pub context_char_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub database: Option<DatabaseConfig>,
    pub memory: Option<MemoryConfig>,
    pub calendar: Option<CalendarConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AssistantError::Config(e.to_string()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AssistantError::Config(e.to_string()))
    }

    /// Fills unset secrets and paths from the environment.
    pub fn resolve_env(mut self) -> Self {
        let openai = self.openai.get_or_insert_with(OpenAiConfig::default);
        if openai.api_key.is_none() {
            openai.api_key = non_empty_env("OPENAI_API_KEY");
        }
        let database = self.database.get_or_insert_with(DatabaseConfig::default);
        if database.sqlite_path.is_none() {
            database.sqlite_path = non_empty_env("CALENDAR_ASSISTANT_DB");
        }
        self
    }

    pub fn sqlite_path(&self) -> String {
        self.database
            .as_ref()
            .and_then(|db| db.sqlite_path.clone())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    pub fn max_messages(&self) -> usize {
        self.memory
            .as_ref()
            .and_then(|m| m.max_messages)
            .filter(|v| *v > 0)
            .unwrap_or(10)
    }

    pub fn max_conversations(&self) -> usize {
        self.memory
            .as_ref()
            .and_then(|m| m.max_conversations)
            .filter(|v| *v > 0)
            .unwrap_or(1024)
    }

    pub fn completion_options(&self) -> CompletionOptions {
        let defaults = CompletionOptions::default();
        let openai = self.openai.as_ref();
        CompletionOptions {
            temperature: openai
                .and_then(|o| o.temperature)
                .unwrap_or(defaults.temperature),
            max_tokens: openai
                .and_then(|o| o.max_tokens)
                .unwrap_or(defaults.max_tokens),
        }
    }

    pub fn assistant_settings(&self) -> Result<AssistantSettings> {
        let defaults = AssistantSettings::default();
        let calendar = self.calendar.clone().unwrap_or_default();
        let workday_start = match calendar.workday_start.as_deref() {
            Some(raw) => parse_clock_time(raw)?,
            None => defaults.workday_start,
        };
        let workday_end = match calendar.workday_end.as_deref() {
            Some(raw) => parse_clock_time(raw)?,
            None => defaults.workday_end,
        };
        if workday_end <= workday_start {
            return Err(AssistantError::Config(
                "calendar.workday_end must be after calendar.workday_start".to_string(),
            ));
        }
        let timeout_secs = self
            .openai
            .as_ref()
            .and_then(|o| o.timeout_secs)
            .unwrap_or(defaults.llm_timeout.as_secs());
        Ok(AssistantSettings {
            workday_start,
            workday_end,
            min_slot_minutes: calendar
                .min_slot_minutes
                .filter(|v| *v > 0)
                .unwrap_or(defaults.min_slot_minutes),
            free_slot_days: calendar
                .free_slot_days
                .filter(|v| *v > 0)
                .unwrap_or(defaults.free_slot_days),
            context_char_limit: calendar
                .context_char_limit
                .unwrap_or(defaults.context_char_limit),
            history_limit: self.max_messages(),
            completion: self.completion_options(),
            llm_timeout: std::time::Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_clock_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| AssistantError::Config(format!("invalid time of day '{raw}', expected HH:MM")))
}
