//! Keyword-level intent detection and date-window resolution for one
//! message. Pure functions over `(text, now)`; English and Russian.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Weekday};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domains::event::LocalWindow;
use crate::timezone::local_days_bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    View,
    Free,
    Create,
    Delete,
    Chat,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::View => "view",
            Intent::Free => "free",
            Intent::Create => "create",
            Intent::Delete => "delete",
            Intent::Chat => "chat",
        }
    }

    pub fn needs_window(&self) -> bool {
        matches!(self, Intent::View | Intent::Free)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResolution {
    pub intent: Intent,
    pub window: Option<LocalWindow>,
}

static CREATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(add|book|create|set up|put)\b|\b(добав\w*|запланир\w*|запиш\w*|созда\w*|назнач\w*|забронир\w*|поставь)",
    )
    .unwrap()
});
static SCHEDULE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bschedul(e|ing)\b").unwrap());
static DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(delete|remove|cancel|drop|erase)\b|\b(удал\w*|отмен\w*|убер\w*|убра\w*)")
        .unwrap()
});
static FREE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(free|available|availability|open slots?|gaps?)\b|\b(свобод\w*|окн[оаи]\w*|окошк\w*)",
    )
    .unwrap()
});
static VIEW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(schedule|calendar|plans?|agenda|events?|meetings?|busy|appointments?)\b|what'?s on|\b(расписан\w*|календар\w*|план\w*|событи\w*|встреч\w*|дела|занят\w*)",
    )
    .unwrap()
});

static DAY_AFTER_TOMORROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bday after tomorrow\b|\bпослезавтра\b").unwrap());
static TOMORROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btomorrow\b|\bзавтра\b").unwrap());
static TODAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\btoday\b|\btonight\b|\bсегодня\b").unwrap());
static NEXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnext\b|\bследующ\w*").unwrap());
static WEEKEND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bweekend\b|\bвыходн\w*").unwrap());
static WEEK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bweek\b|\bнедел\w*").unwrap());
static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[./](\d{1,2})(?:[./](\d{4}|\d{2}))?\b(\s*(h|hr|hours?|ч|час\w*)\b)?")
        .unwrap()
});
static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})\s+(\p{L}+)").unwrap());
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\p{L}+)\s+(\d{1,2})\b").unwrap());

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
    ("понедельник", Weekday::Mon),
    ("вторник", Weekday::Tue),
    ("среда", Weekday::Wed),
    ("среду", Weekday::Wed),
    ("среды", Weekday::Wed),
    ("среде", Weekday::Wed),
    ("четверг", Weekday::Thu),
    ("пятниц", Weekday::Fri),
    ("суббот", Weekday::Sat),
    ("воскресень", Weekday::Sun),
];

/// A `d.m` token right after one of these is a clock time ("в 10.05").
const TIME_PREPOSITIONS: &[&str] = &["at", "в", "во"];

/// Words that make "schedule" a noun ("my schedule") rather than a verb.
const SCHEDULE_NOUN_MARKERS: &[&str] = &[
    "my", "the", "your", "our", "this", "that", "today's", "tomorrow's", "week's", "weekly",
    "daily", "full", "whole",
];

/// Resolves the intent and, when relevant, the local window it refers to.
/// View and free-time intents always get a window (today by default);
/// create and delete get one only when the text names a date.
pub fn resolve(text: &str, now: DateTime<Tz>) -> IntentResolution {
    let lowered = text.to_lowercase();
    let intent = detect_intent_lowered(&lowered);
    let window = match intent {
        Intent::View | Intent::Free => {
            Some(explicit_window_lowered(&lowered, now).unwrap_or_else(|| today_window(now)))
        }
        Intent::Create | Intent::Delete => explicit_window_lowered(&lowered, now),
        Intent::Chat => None,
    };
    IntentResolution { intent, window }
}

pub fn detect_intent(text: &str) -> Intent {
    detect_intent_lowered(&text.to_lowercase())
}

/// The window named by the text, if any.
pub fn explicit_window(text: &str, now: DateTime<Tz>) -> Option<LocalWindow> {
    explicit_window_lowered(&text.to_lowercase(), now)
}

pub fn today_window(now: DateTime<Tz>) -> LocalWindow {
    day_window(now.date_naive(), 1, now.timezone())
}

/// `[local midnight of date, local midnight of date + days)`.
pub fn day_window(date: NaiveDate, days: i64, tz: Tz) -> LocalWindow {
    let (start, end) = local_days_bounds(date, days, tz);
    LocalWindow::new(start.with_timezone(&tz), end.with_timezone(&tz))
}

/// Finds a literal date (`2025-06-18`, `18.06`, `18/06/2025`, `18 june`,
/// `june 18`, `18 июня`). Years default to the year of `today`.
pub fn parse_date_token(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = text.to_lowercase();
    parse_date_token_lowered(&lowered, today)
}

fn detect_intent_lowered(text: &str) -> Intent {
    if CREATE_RE.is_match(text) || schedule_used_as_verb(text) {
        Intent::Create
    } else if DELETE_RE.is_match(text) {
        Intent::Delete
    } else if FREE_RE.is_match(text) {
        Intent::Free
    } else if VIEW_RE.is_match(text) {
        Intent::View
    } else {
        Intent::Chat
    }
}

fn schedule_used_as_verb(text: &str) -> bool {
    SCHEDULE_RE.find_iter(text).any(|m| {
        let previous = text[..m.start()].split_whitespace().last();
        !previous.is_some_and(|word| SCHEDULE_NOUN_MARKERS.contains(&word))
    })
}

fn explicit_window_lowered(text: &str, now: DateTime<Tz>) -> Option<LocalWindow> {
    let tz = now.timezone();
    let today = now.date_naive();

    if DAY_AFTER_TOMORROW_RE.is_match(text) {
        return Some(day_window(today + Duration::days(2), 1, tz));
    }
    if TODAY_RE.is_match(text) {
        return Some(day_window(today, 1, tz));
    }
    if TOMORROW_RE.is_match(text) {
        return Some(day_window(today + Duration::days(1), 1, tz));
    }
    if let Some(target) = weekday_in(text) {
        let date = if NEXT_RE.is_match(text) {
            next_week_day(today, target)
        } else {
            nearest_day(today, target)
        };
        return Some(day_window(date, 1, tz));
    }
    if WEEKEND_RE.is_match(text) {
        return Some(day_window(weekend_start(today), 2, tz));
    }
    if WEEK_RE.is_match(text) {
        let mut monday = week_monday(today);
        if NEXT_RE.is_match(text) {
            monday += Duration::days(7);
        }
        return Some(day_window(monday, 7, tz));
    }
    parse_date_token_lowered(text, today).map(|date| day_window(date, 1, tz))
}

fn weekday_in(text: &str) -> Option<Weekday> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            WEEKDAYS
                .iter()
                .find(|(name, _)| word.starts_with(name))
                .map(|(_, day)| *day)
        })
}

/// The closest `target` on or after `today`.
pub fn nearest_day(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    today + Duration::days(ahead)
}

/// `target` in the Monday-aligned week after the current one.
pub fn next_week_day(today: NaiveDate, target: Weekday) -> NaiveDate {
    week_monday(today) + Duration::days(7 + target.num_days_from_monday() as i64)
}

pub fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Saturday of the current weekend: on Sunday that is yesterday.
pub fn weekend_start(today: NaiveDate) -> NaiveDate {
    match today.weekday() {
        Weekday::Sun => today - Duration::days(1),
        _ => nearest_day(today, Weekday::Sat),
    }
}

fn parse_date_token_lowered(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        if caps.get(4).is_some() {
            continue;
        }
        let token_start = caps.get(0).map_or(0, |m| m.start());
        let previous = text[..token_start].split_whitespace().last();
        if previous.is_some_and(|word| TIME_PREPOSITIONS.contains(&word)) {
            continue;
        }
        let Some(day) = caps[1].parse::<u32>().ok() else {
            continue;
        };
        let Some(month) = caps[2].parse::<u32>().ok() else {
            continue;
        };
        let year = match caps.get(3) {
            Some(raw) => match raw.as_str().parse::<i32>() {
                Ok(y) if y < 100 => 2000 + y,
                Ok(y) => y,
                Err(_) => continue,
            },
            None => today.year(),
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    for caps in DAY_MONTH_RE.captures_iter(text) {
        if let (Ok(day), Some(month)) = (caps[1].parse::<u32>(), month_from_name(&caps[2])) {
            if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
                return Some(date);
            }
        }
    }
    for caps in MONTH_DAY_RE.captures_iter(text) {
        if let (Some(month), Ok(day)) = (month_from_name(&caps[1]), caps[2].parse::<u32>()) {
            if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
                return Some(date);
            }
        }
    }
    None
}

fn month_from_name(word: &str) -> Option<u32> {
    const MONTHS: &[(&str, &str, u32)] = &[
        ("january", "январ", 1),
        ("february", "феврал", 2),
        ("march", "март", 3),
        ("april", "апрел", 4),
        ("may", "ма", 5),
        ("june", "июн", 6),
        ("july", "июл", 7),
        ("august", "август", 8),
        ("september", "сентябр", 9),
        ("october", "октябр", 10),
        ("november", "ноябр", 11),
        ("december", "декабр", 12),
    ];
    MONTHS.iter().find_map(|(en, ru, month)| {
        let english = word.len() >= 3 && en.starts_with(word);
        let russian = match month {
            5 => word == "май" || word == "мая",
            _ => word.starts_with(ru),
        };
        (english || russian).then_some(*month)
    })
}
