//! Structured tags embedded in model replies.
//!
//! A reply may carry one `<calendar_data>{...}</calendar_data>` block asking
//! to create an event and one `<calendar_delete>{...}</calendar_delete>`
//! block asking to delete one. Malformed JSON counts as no block. The text
//! shown to the user never contains tag markup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::domains::event::{EventEnd, NewEventInput};
use crate::error::{AssistantError, Result};
use crate::services::duration::parse_duration_value;

pub const CREATE_TAG: &str = "calendar_data";
pub const DELETE_TAG: &str = "calendar_delete";

static CREATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<calendar_data>\s*(\{.*?\})\s*</calendar_data>").unwrap());
static DELETE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<calendar_delete>\s*(\{.*?\})\s*</calendar_delete>").unwrap());
static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(calendar_data|calendar_delete)>.*?</(calendar_data|calendar_delete)>")
        .unwrap()
});
static UNCLOSED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(calendar_data|calendar_delete)>.*$").unwrap());
static STRAY_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?\s*(calendar_data|calendar_delete)\s*>").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CreatePayload {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration: Value,
    pub description: Option<String>,
}

impl CreatePayload {
    /// Converts to store input. Title and start are required; the end comes
    /// from `end`, else from `duration`, else the default length.
    pub fn to_input(&self) -> Result<NewEventInput> {
        let title = non_blank(self.title.as_deref())
            .ok_or_else(|| AssistantError::Validation("event title is missing".to_string()))?;
        let start = non_blank(self.start.as_deref())
            .ok_or_else(|| AssistantError::Validation("event start is missing".to_string()))?;
        let end = match non_blank(self.end.as_deref()) {
            Some(end) => EventEnd::At(end),
            None => match parse_duration_value(&self.duration)? {
                Some(length) => EventEnd::After(length),
                None => EventEnd::Default,
            },
        };
        Ok(NewEventInput {
            title,
            start,
            end,
            description: non_blank(self.description.as_deref()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EventIdValue {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeletePayload {
    pub title: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub event_id: Option<EventIdValue>,
}

impl DeletePayload {
    pub fn event_id(&self) -> Option<i32> {
        match self.event_id.as_ref()? {
            EventIdValue::Number(n) => i32::try_from(*n).ok(),
            EventIdValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn title(&self) -> Option<String> {
        non_blank(self.title.as_deref())
    }

    pub fn start(&self) -> Option<String> {
        non_blank(self.start.as_deref())
    }

    pub fn date(&self) -> Option<String> {
        non_blank(self.date.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub create: Option<CreatePayload>,
    pub delete: Option<DeletePayload>,
    pub clean_text: String,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    ParsedReply {
        create: extract(&CREATE_RE, raw, CREATE_TAG),
        delete: extract(&DELETE_RE, raw, DELETE_TAG),
        clean_text: strip_tags(raw),
    }
}

/// Removes every tag block, anything after an unclosed opening tag and stray
/// markers, then tidies blank lines.
pub fn strip_tags(raw: &str) -> String {
    let without_blocks = BLOCK_RE.replace_all(raw, "");
    let without_unclosed = UNCLOSED_RE.replace(&without_blocks, "");
    let without_markers = STRAY_MARKER_RE.replace_all(&without_unclosed, "");
    BLANK_LINES_RE
        .replace_all(&without_markers, "\n\n")
        .trim()
        .to_string()
}

fn extract<T: for<'de> Deserialize<'de>>(re: &Regex, raw: &str, tag: &str) -> Option<T> {
    let json = re.captures(raw)?.get(1)?.as_str();
    match serde_json::from_str(json) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(tag, error = %err, "ignoring malformed tag payload");
            None
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
