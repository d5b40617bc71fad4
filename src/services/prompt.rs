use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::format::truncate_chars;
use crate::domains::user::{Gender, Personality};
use crate::services::locale::Language;
use crate::timezone::utc_offset_label;

pub fn persona_text(personality: Personality) -> &'static str {
    match personality {
        Personality::Assistant => {
            "You are a professional calendar assistant. Your tone is formal and efficient."
        }
        Personality::Coach => {
            "You are an energetic motivational coach who also keeps the user's calendar. Your tone is upbeat and direct."
        }
        Personality::Friend => {
            "You are the user's close friend who helps with their calendar. Talk casually, like a real friend would."
        }
        Personality::Girlfriend => {
            "You are a warm, caring girlfriend who helps with the user's calendar. Be supportive and affectionate; you may start list lines with a fitting emoji."
        }
        Personality::Boyfriend => {
            "You are a caring, reassuring boyfriend who helps with the user's calendar. Be supportive and warm; you may start list lines with a fitting emoji."
        }
    }
}

pub fn gender_text(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "The user is male; adapt grammar and wording accordingly.",
        Gender::Female => "The user is female; adapt grammar and wording accordingly.",
        Gender::Other => "Keep your wording gender-neutral.",
    }
}

/// "Today is 2025-06-16 (Monday), local time 12:00, timezone Europe/Moscow (UTC+03:00)."
pub fn today_line(now: DateTime<Tz>) -> String {
    let tz = now.timezone();
    format!(
        "Today is {} ({}), local time {}, timezone {} ({}).",
        now.format("%Y-%m-%d"),
        now.format("%A"),
        now.format("%H:%M"),
        tz.name(),
        utc_offset_label(tz, now.with_timezone(&Utc))
    )
}

const CALENDAR_INSTRUCTIONS: &str = "\
Calendar rules:
- Every time shown to you is already in the user's local timezone. Repeat times exactly; never convert them.
- Use 24-hour time (15:00, not 3 PM). Put each event on its own line starting with \"- \".
- Only create an event when the user explicitly asks to add, book or schedule one. Reply with
  <calendar_data>{\"title\": \"...\", \"start\": \"YYYY-MM-DDTHH:MM\", \"end\": \"YYYY-MM-DDTHH:MM\", \"description\": \"...\"}</calendar_data>
  \"end\" may be replaced by \"duration\" (for example \"1 hour\" or 90). \"description\" is optional.
- To delete an event reply with
  <calendar_delete>{\"title\": \"...\", \"date\": \"YYYY-MM-DD\"}</calendar_delete>
  Add \"event_id\" (preferred, shown as [id N] in the calendar) or \"start\" (\"YYYY-MM-DDTHH:MM\") to pick one event.
  If several events match and you have neither, ask the user which one instead of emitting the tag.
- After any tag, leave a blank line and write a short, friendly reply. Never mention the tags or the JSON.
- When asked for free time, suggest slots from the free slot list.
- Keep replies concise. You are an AI and cannot attend meetings or act in the physical world.";

/// Inputs to the system prompt for one turn.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub personality: Personality,
    pub gender: Gender,
    pub language: Language,
    pub now: DateTime<Tz>,
    pub calendar_context: &'a str,
    pub context_char_limit: usize,
}

pub fn build_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut parts = vec![
        persona_text(ctx.personality).to_string(),
        gender_text(ctx.gender).to_string(),
        format!("Respond in {}.", ctx.language.name()),
        today_line(ctx.now),
        CALENDAR_INSTRUCTIONS.to_string(),
    ];
    if !ctx.calendar_context.trim().is_empty() {
        parts.push(truncate_chars(ctx.calendar_context, ctx.context_char_limit));
    }
    parts.join("\n")
}
