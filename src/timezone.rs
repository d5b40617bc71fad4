//! Conversion between a user's wall-clock time and UTC storage.
//!
//! Everything persisted is UTC; everything shown to a user or to the
//! language model is local. Inputs without an offset are wall-clock time in
//! the user's zone.

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::domains::event::{default_event_duration, CalendarEvent, LocalEvent};
use crate::error::{AssistantError, Result};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A parsed instant that may or may not carry its own offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantInput {
    /// Wall-clock time, interpreted in the user's zone.
    Floating(NaiveDateTime),
    Absolute(DateTime<FixedOffset>),
}

impl From<NaiveDateTime> for InstantInput {
    fn from(value: NaiveDateTime) -> Self {
        InstantInput::Floating(value)
    }
}

impl<T: TimeZone> From<DateTime<T>> for InstantInput {
    fn from(value: DateTime<T>) -> Self {
        InstantInput::Absolute(value.fixed_offset())
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AssistantError::Validation(format!("unknown timezone '{name}'")))
}

/// Like [`parse_timezone`] but falls back to UTC, which is the stored default.
pub fn timezone_or_utc(name: &str) -> Tz {
    match parse_timezone(name) {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = name, "unknown timezone, using UTC");
            Tz::UTC
        }
    }
}

pub fn parse_instant(raw: &str) -> Result<InstantInput> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AssistantError::Validation("empty date/time".to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(InstantInput::Absolute(dt));
    }
    let zulu_normalized = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .map(|rest| format!("{rest}+00:00"));
    let with_offset = zulu_normalized.as_deref().unwrap_or(raw);
    for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z", "%Y-%m-%dT%H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(with_offset, fmt) {
            return Ok(InstantInput::Absolute(dt));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(InstantInput::Floating(dt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(InstantInput::Floating(date.and_time(NaiveTime::MIN)));
    }
    Err(AssistantError::Validation(format!(
        "unrecognized date/time '{raw}'"
    )))
}

/// Resolves a wall-clock time in `tz`. Ambiguous times (DST fall-back) take
/// the earlier instant; times inside a DST gap are pushed forward an hour.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

pub fn to_utc(instant: &InstantInput, tz: Tz) -> DateTime<Utc> {
    match instant {
        InstantInput::Floating(naive) => local_to_utc(*naive, tz),
        InstantInput::Absolute(dt) => dt.with_timezone(&Utc),
    }
}

pub fn to_local(event: &CalendarEvent, tz: Tz) -> LocalEvent {
    LocalEvent {
        id: event.id,
        owner_id: event.owner_id,
        title: event.title.clone(),
        description: event.description.clone(),
        start_time: event.start_time.with_timezone(&tz),
        end_time: event.end_time.map(|end| end.with_timezone(&tz)),
        created_at: event.created_at.with_timezone(&tz),
        updated_at: event.updated_at.with_timezone(&tz),
    }
}

/// Normalizes both bounds to UTC. A missing end defaults to one hour after
/// the start.
pub fn validate_and_convert_times(
    start: &InstantInput,
    end: Option<&InstantInput>,
    tz: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_utc = to_utc(start, tz);
    let end_utc = match end {
        Some(end) => to_utc(end, tz),
        None => start_utc + default_event_duration(),
    };
    if end_utc <= start_utc {
        return Err(AssistantError::InvalidRange {
            start: start_utc,
            end: end_utc,
        });
    }
    Ok((start_utc, end_utc))
}

/// `[local midnight, next local midnight)` of `date`, in UTC.
pub fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    local_days_bounds(date, 1, tz)
}

/// `[local midnight of date, local midnight of date + days)`, in UTC.
pub fn local_days_bounds(date: NaiveDate, days: i64, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(date.and_time(NaiveTime::MIN), tz);
    let end = local_to_utc((date + Duration::days(days)).and_time(NaiveTime::MIN), tz);
    (start, end)
}

/// "UTC+03:00" style label for the offset in force at `at`.
pub fn utc_offset_label(tz: Tz, at: DateTime<Utc>) -> String {
    let offset = tz.offset_from_utc_datetime(&at.naive_utc()).fix();
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.abs();
    format!("UTC{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
}
