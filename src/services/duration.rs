//! Event-length grammar: unit/count pairs in English or Russian
//! (`2 days`, `1h30m`, `1.5 часа`, `полчаса`), `hh:mm`, or bare minutes.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{AssistantError, Result};

static PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*(\p{L}+)?").unwrap());
static CLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").unwrap());

const FILLER_WORDS: &[&str] = &["and", "и", "for", "на"];

/// Longest accepted event: one leap year.
pub const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return Err(unparseable(raw));
    }
    if let Some(minutes) = phrase_minutes(&text) {
        return Ok(Duration::minutes(minutes));
    }
    if let Some(caps) = CLOCK_RE.captures(&text) {
        let hours: i64 = caps[1].parse().map_err(|_| unparseable(raw))?;
        let minutes: i64 = caps[2].parse().map_err(|_| unparseable(raw))?;
        return positive((hours * 60 + minutes) as f64, raw);
    }
    if let Ok(minutes) = text.replace(',', ".").parse::<f64>() {
        return positive(minutes, raw);
    }

    let mut total = 0.0_f64;
    let mut consumed = String::new();
    for caps in PAIR_RE.captures_iter(&text) {
        let count: f64 = caps[1]
            .replace(',', ".")
            .parse()
            .map_err(|_| unparseable(raw))?;
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let per_unit = unit_minutes(unit).ok_or_else(|| unparseable(raw))?;
        total += count * per_unit as f64;
        consumed.push_str(&caps[0]);
    }
    if consumed.is_empty() || !only_fillers_left(&text) {
        return Err(unparseable(raw));
    }
    positive(total, raw)
}

/// Interprets the `duration` field of a creation payload. Numbers are
/// minutes; `null` means no duration was given.
pub fn parse_duration_value(value: &Value) -> Result<Option<Duration>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let minutes = n.as_f64().ok_or_else(|| unparseable(&n.to_string()))?;
            positive(minutes, &n.to_string()).map(Some)
        }
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_duration(s).map(Some),
        other => Err(unparseable(&other.to_string())),
    }
}

fn unit_minutes(unit: &str) -> Option<i64> {
    match unit {
        "w" | "wk" | "wks" | "week" | "weeks" => return Some(7 * 24 * 60),
        "d" | "day" | "days" | "день" | "дня" | "дней" | "дн" => return Some(24 * 60),
        "h" | "hr" | "hrs" | "hour" | "hours" | "ч" => return Some(60),
        "m" | "min" | "mins" | "minute" | "minutes" | "мин" => return Some(1),
        _ => {}
    }
    if unit.starts_with("недел") {
        Some(7 * 24 * 60)
    } else if unit.starts_with("сут") {
        Some(24 * 60)
    } else if unit.starts_with("час") {
        Some(60)
    } else if unit.starts_with("минут") {
        Some(1)
    } else {
        None
    }
}

fn phrase_minutes(text: &str) -> Option<i64> {
    match text {
        "half an hour" | "half hour" | "полчаса" => Some(30),
        "an hour" | "one hour" | "hour" | "час" | "один час" => Some(60),
        "an hour and a half" | "полтора часа" => Some(90),
        "a day" | "one day" | "day" | "день" | "весь день" => Some(24 * 60),
        _ => None,
    }
}

fn only_fillers_left(text: &str) -> bool {
    PAIR_RE
        .replace_all(text, " ")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|word| !word.is_empty())
        .all(|word| FILLER_WORDS.contains(&word))
}

/// Rounds to whole minutes; rejects NaN, infinities, non-positive lengths
/// and anything longer than [`MAX_DURATION_MINUTES`].
fn positive(minutes: f64, raw: &str) -> Result<Duration> {
    if !minutes.is_finite() {
        return Err(unparseable(raw));
    }
    let minutes = minutes.round();
    if minutes <= 0.0 {
        return Err(unparseable(raw));
    }
    if minutes > MAX_DURATION_MINUTES as f64 {
        return Err(AssistantError::Validation(format!(
            "duration '{raw}' is longer than {} days",
            MAX_DURATION_MINUTES / (24 * 60)
        )));
    }
    Duration::try_minutes(minutes as i64).ok_or_else(|| unparseable(raw))
}

fn unparseable(raw: &str) -> AssistantError {
    AssistantError::Validation(format!("unparseable duration '{raw}'"))
}
