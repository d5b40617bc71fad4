//! Assistant Orchestrator: one inbound message in, one clean reply out.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::calendar::format::{format_events, format_free_slots};
use crate::calendar::{CalendarService, EventStore};
use crate::chat::{ChatStore, DEFAULT_CHAT_TITLE};
use crate::domains::chat::{ChatTurn, Role};
use crate::domains::event::{DeleteOutcome, LocalWindow};
use crate::domains::user::User;
use crate::error::{AssistantError, FailureKind, Result};
use crate::intent::{self, Intent, IntentResolution};
use crate::interfaces::clock::Clock;
use crate::interfaces::providers::{CompletionOptions, LlmProvider};
use crate::providers::memory::ConversationMemory;
use crate::services::locale::Language;
use crate::services::prompt::{build_system_prompt, PromptContext};
use crate::services::tags::{parse_reply, CreatePayload, DeletePayload};
use crate::timezone::{parse_instant, to_utc, InstantInput};

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub min_slot_minutes: i64,
    pub free_slot_days: i64,
    pub context_char_limit: usize,
    pub history_limit: usize,
    pub completion: CompletionOptions,
    pub llm_timeout: StdDuration,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            workday_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            workday_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            min_slot_minutes: 30,
            free_slot_days: 7,
            context_char_limit: 1000,
            history_limit: 10,
            completion: CompletionOptions::default(),
            llm_timeout: StdDuration::from_secs(30),
        }
    }
}

/// What the caller gets back for one message. Never an error: failures are
/// folded into `reply_text` and flagged in `failure`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssistantReply {
    pub reply_text: String,
    pub conversation_id: Option<i32>,
    pub created_event_id: Option<i32>,
    pub deleted_event_id: Option<i32>,
    pub should_create_event: bool,
    pub was_deleted: bool,
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnStage {
    Received,
    ContextBuilt,
    ModelInvoked,
    TagsParsed,
    MutationApplied,
    PersistedBothTurns,
    RepliedToCaller,
}

pub struct AssistantService {
    llm: Arc<dyn LlmProvider>,
    events: Arc<EventStore>,
    chats: Arc<ChatStore>,
    memory: Arc<ConversationMemory>,
    clock: Arc<dyn Clock>,
    settings: AssistantSettings,
}

impl AssistantService {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        events: Arc<EventStore>,
        chats: Arc<ChatStore>,
        memory: Arc<ConversationMemory>,
        clock: Arc<dyn Clock>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            llm,
            events,
            chats,
            memory,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    pub fn calendar_for(&self, user: &User) -> CalendarService {
        CalendarService::new(self.events.clone(), user)
    }

    pub async fn handle_message(&self, user: &User, message: &str) -> AssistantReply {
        let language = Language::detect(message, &user.preferred_language);
        log_stage(TurnStage::Received, user.id);

        if message.trim().is_empty() {
            return AssistantReply {
                reply_text: language.empty_message(),
                failure: Some(FailureKind::Validation),
                ..AssistantReply::default()
            };
        }

        match self.run_turn(user, message, language).await {
            Ok(reply) => {
                log_stage(TurnStage::RepliedToCaller, user.id);
                reply
            }
            Err(err) => {
                error!(user_id = user.id, error = %err, "assistant turn failed");
                AssistantReply {
                    reply_text: language.generic_failure(),
                    failure: Some(FailureKind::Internal),
                    ..AssistantReply::default()
                }
            }
        }
    }

    async fn run_turn(
        &self,
        user: &User,
        message: &str,
        language: Language,
    ) -> Result<AssistantReply> {
        let now = self.clock.now();
        let calendar = self.calendar_for(user);
        let tz = calendar.timezone();
        let now_local = now.with_timezone(&tz);

        let chat = self
            .chats
            .get_or_create_chat(user.id, DEFAULT_CHAT_TITLE, now)
            .await?;
        let history = self.history(chat.id).await?;

        let resolution = intent::resolve(message, now_local);
        let calendar_context = self
            .build_context(&calendar, &resolution, now)
            .await?;
        debug!(
            stage = ?TurnStage::ContextBuilt,
            user_id = user.id,
            intent = resolution.intent.as_str(),
            context_chars = calendar_context.chars().count(),
            "assistant turn"
        );

        let system_prompt = build_system_prompt(&PromptContext {
            personality: user.chat_personality,
            gender: user.gender,
            language,
            now: now_local,
            calendar_context: &calendar_context,
            context_char_limit: self.settings.context_char_limit,
        });
        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ChatTurn::new(Role::System, system_prompt));
        turns.extend(history);
        turns.push(ChatTurn::new(Role::User, message));

        let mut reply = AssistantReply {
            conversation_id: Some(chat.id),
            ..AssistantReply::default()
        };

        let raw = match self.complete(&turns).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(user_id = user.id, error = %err, "language model call failed");
                reply.reply_text = language.apology();
                reply.failure = Some(FailureKind::ExternalService);
                self.persist(chat.id, message, &reply.reply_text, now, false)
                    .await?;
                return Ok(reply);
            }
        };
        log_stage(TurnStage::ModelInvoked, user.id);

        let parsed = parse_reply(&raw);
        debug!(
            stage = ?TurnStage::TagsParsed,
            user_id = user.id,
            create = parsed.create.is_some(),
            delete = parsed.delete.is_some(),
            "assistant turn"
        );
        reply.reply_text = parsed.clean_text;

        if let Some(payload) = &parsed.create {
            self.apply_create(&calendar, payload, now, language, &mut reply)
                .await?;
        }
        if let Some(payload) = &parsed.delete {
            let deleted = self
                .apply_delete(&calendar, payload, &resolution, now_local, language, &mut reply)
                .await;
            keep_committed(&reply, deleted, user.id)?;
        }
        if parsed.create.is_some() || parsed.delete.is_some() {
            log_stage(TurnStage::MutationApplied, user.id);
        }

        let persisted = self
            .persist(chat.id, message, &reply.reply_text, now, true)
            .await;
        keep_committed(&reply, persisted, user.id)?;
        Ok(reply)
    }

    /// Recent turns for the prompt, copied before this message is added.
    async fn history(&self, chat_id: i32) -> Result<Vec<ChatTurn>> {
        if !self.memory.contains(chat_id).await {
            let stored = self
                .chats
                .latest_messages(chat_id, self.settings.history_limit)
                .await?;
            if !stored.is_empty() {
                debug!(chat_id, messages = stored.len(), "hydrating conversation memory");
                self.memory
                    .hydrate(chat_id, stored.iter().map(|m| m.to_turn()).collect())
                    .await;
            }
        }
        Ok(self.memory.get(chat_id).await)
    }

    async fn build_context(
        &self,
        calendar: &CalendarService,
        resolution: &IntentResolution,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let Some(window) = resolution.window else {
            return Ok(String::new());
        };
        let tz = calendar.timezone();
        let events = calendar.events_in_window(&window).await?;
        let events_text = format_events(&events, &window, now, tz);
        if resolution.intent != Intent::Free {
            return Ok(events_text);
        }

        let from = free_scan_start(&window, now, tz);
        let slots = calendar
            .find_free_slots(
                from,
                LocalWindow::new(from, window.end).days(),
                self.settings.min_slot_minutes,
                self.settings.workday_start,
                self.settings.workday_end,
            )
            .await?;
        Ok(format!(
            "{}\n\n{}",
            format_free_slots(&slots, &window, now, tz),
            events_text
        ))
    }

    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        match tokio::time::timeout(
            self.settings.llm_timeout,
            self.llm.chat_completion(turns, &self.settings.completion),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AssistantError::ExternalService(format!(
                "language model timed out after {:?}",
                self.settings.llm_timeout
            ))),
        }
    }

    async fn apply_create(
        &self,
        calendar: &CalendarService,
        payload: &CreatePayload,
        now: DateTime<Utc>,
        language: Language,
        reply: &mut AssistantReply,
    ) -> Result<()> {
        let tz = calendar.timezone();
        let input = match payload.to_input() {
            Ok(input) => input,
            Err(err) => {
                warn!(error = %err, "incomplete creation payload");
                reply.reply_text = language.invalid_event();
                reply.failure = Some(err.kind());
                return Ok(());
            }
        };
        match calendar.create_event(&input, now).await {
            Ok(event) => {
                reply.created_event_id = Some(event.id);
                reply.should_create_event = true;
                if reply.reply_text.is_empty() {
                    reply.reply_text = language.created(&event, tz);
                }
                Ok(())
            }
            Err(AssistantError::Conflict { event }) => {
                info!(conflict_with = event.id, "creation refused: conflict");
                reply.reply_text = language.conflict(&event, tz);
                reply.failure = Some(FailureKind::Conflict);
                Ok(())
            }
            Err(AssistantError::PastTime { when }) => {
                info!(%when, "creation refused: start in the past");
                reply.reply_text = language.past_time(when.with_timezone(&tz));
                reply.failure = Some(FailureKind::PastTime);
                Ok(())
            }
            Err(err @ (AssistantError::Validation(_) | AssistantError::InvalidRange { .. })) => {
                warn!(error = %err, "creation payload rejected");
                reply.reply_text = language.invalid_event();
                reply.failure = Some(FailureKind::Validation);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Target precedence: explicit id, then start + title/date, then title +
    /// date. Several candidates without a disambiguator are never guessed.
    async fn apply_delete(
        &self,
        calendar: &CalendarService,
        payload: &DeletePayload,
        resolution: &IntentResolution,
        now_local: DateTime<Tz>,
        language: Language,
        reply: &mut AssistantReply,
    ) -> Result<()> {
        let tz = calendar.timezone();
        let outcome = match payload.event_id() {
            Some(id) => calendar.delete_event(id).await,
            None => match self.delete_by_title(calendar, payload, resolution, now_local).await? {
                Some(outcome) => outcome.into_result("event matching the title"),
                None => {
                    reply.reply_text = language.not_found();
                    reply.failure = Some(FailureKind::Validation);
                    return Ok(());
                }
            },
        };

        match outcome {
            Ok(event) => {
                reply.deleted_event_id = Some(event.id);
                reply.was_deleted = true;
                if reply.reply_text.is_empty() {
                    reply.reply_text = language.deleted(&event, tz);
                }
            }
            Err(AssistantError::NotFound(what)) => {
                info!(%what, "deletion target not found");
                reply.reply_text = language.not_found();
                reply.failure = Some(FailureKind::NotFound);
            }
            Err(AssistantError::AmbiguousTarget { candidates }) => {
                info!(
                    candidates = candidates.len(),
                    "deletion needs clarification"
                );
                reply.reply_text = language.ambiguous(&candidates, tz);
                reply.failure = Some(FailureKind::Ambiguous);
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Title-based lookup. `None` when the payload cannot identify an event.
    async fn delete_by_title(
        &self,
        calendar: &CalendarService,
        payload: &DeletePayload,
        resolution: &IntentResolution,
        now_local: DateTime<Tz>,
    ) -> Result<Option<DeleteOutcome>> {
        let tz = calendar.timezone();
        let Some(title) = payload.title() else {
            return Ok(None);
        };
        let start = match payload.start().map(|raw| parse_instant(&raw)).transpose() {
            Ok(start) => start,
            Err(err) => {
                warn!(error = %err, "deletion payload has an unreadable start");
                return Ok(None);
            }
        };
        let date = payload
            .date()
            .and_then(|raw| parse_payload_date(&raw))
            .or_else(|| {
                start
                    .as_ref()
                    .map(|s| to_utc(s, tz).with_timezone(&tz).date_naive())
            })
            .or_else(|| resolution.window.map(|w| w.start.date_naive()))
            .unwrap_or_else(|| now_local.date_naive());

        calendar
            .delete_event_by_title_and_date(&title, date, start.as_ref())
            .await
            .map(Some)
    }

    async fn persist(
        &self,
        chat_id: i32,
        user_message: &str,
        assistant_message: &str,
        now: DateTime<Utc>,
        remember_answer: bool,
    ) -> Result<()> {
        self.chats
            .append_exchange(chat_id, user_message, assistant_message, now)
            .await?;
        self.memory.add(chat_id, Role::User, user_message).await;
        if remember_answer {
            self.memory
                .add(chat_id, Role::Assistant, assistant_message)
                .await;
        }
        log_stage(TurnStage::PersistedBothTurns, chat_id);
        Ok(())
    }
}

/// Once an event was created or deleted, later failures in the turn are
/// logged and the reply still reports the change.
fn keep_committed(reply: &AssistantReply, result: Result<()>, user_id: i32) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if reply.created_event_id.is_some() || reply.deleted_event_id.is_some() => {
            error!(
                user_id,
                created_event_id = ?reply.created_event_id,
                deleted_event_id = ?reply.deleted_event_id,
                error = %err,
                "calendar change committed but the turn did not finish"
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Free-slot scanning starts at the window start, or at now while the
/// window is in progress.
fn free_scan_start(window: &LocalWindow, now: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    let now_local = now.with_timezone(&tz);
    if now_local > window.start && now_local < window.end {
        now_local
    } else {
        window.start
    }
}

fn parse_payload_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| match parse_instant(raw).ok()? {
            InstantInput::Floating(naive) => Some(naive.date()),
            InstantInput::Absolute(dt) => Some(dt.date_naive()),
        })
}

fn log_stage(stage: TurnStage, id: i32) {
    debug!(stage = ?stage, id, "assistant turn");
}
