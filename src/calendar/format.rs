//! Renders calendar windows as compact text for the language model.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::domains::event::{CalendarEvent, FreeSlot, LocalWindow};
use crate::timezone::utc_offset_label;

pub const NO_EVENTS_MARKER: &str = "(no events)";
pub const NO_FREE_SLOTS_MARKER: &str = "(no free slots)";

/// Buckets the events of `window` into past, current and upcoming lists in
/// 24-hour local time, under a header naming the zone and its UTC offset.
pub fn format_events(
    events: &[CalendarEvent],
    window: &LocalWindow,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    let mut out = header("Events", window, now, tz);
    if events.is_empty() {
        out.push('\n');
        out.push_str(NO_EVENTS_MARKER);
        return out;
    }

    let multi_day = !window.is_single_day();
    let mut past = Vec::new();
    let mut current = Vec::new();
    let mut upcoming = Vec::new();
    for event in events {
        let line = event_line(event, tz, multi_day);
        if event.effective_end() <= now {
            past.push(line);
        } else if event.start_time <= now {
            current.push(line);
        } else {
            upcoming.push(line);
        }
    }

    for (label, lines) in [("Past", past), ("Current", current), ("Upcoming", upcoming)] {
        if lines.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(label);
        out.push(':');
        for line in lines {
            out.push('\n');
            out.push_str(&line);
        }
    }
    out
}

pub fn format_free_slots(
    slots: &[FreeSlot],
    window: &LocalWindow,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    let mut out = header("Free slots", window, now, tz);
    if slots.is_empty() {
        out.push('\n');
        out.push_str(NO_FREE_SLOTS_MARKER);
        return out;
    }
    for slot in slots {
        out.push_str(&format!(
            "\n- {} {}-{} ({})",
            slot.start.format("%a %d %b"),
            slot.start.format("%H:%M"),
            slot.end.format("%H:%M"),
            human_minutes(slot.duration_minutes)
        ));
    }
    out
}

/// "1 h 30 min", "45 min", "2 h".
pub fn human_minutes(minutes: i64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} h"),
        (h, m) => format!("{h} h {m} min"),
    }
}

/// Cuts `text` to at most `limit` characters on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn header(what: &str, window: &LocalWindow, now: DateTime<Utc>, tz: Tz) -> String {
    let offset = utc_offset_label(tz, now);
    if window.is_single_day() {
        format!(
            "{what} for {} ({}, {offset})",
            window.start.format("%Y-%m-%d %A"),
            tz.name()
        )
    } else {
        let last_day = (window.end - chrono::Duration::seconds(1)).date_naive();
        format!(
            "{what} for {} to {} ({}, {offset})",
            window.start.format("%Y-%m-%d"),
            last_day.format("%Y-%m-%d"),
            tz.name()
        )
    }
}

fn event_line(event: &CalendarEvent, tz: Tz, with_date: bool) -> String {
    let start = event.start_time.with_timezone(&tz);
    let end = event.effective_end().with_timezone(&tz);
    let day = if with_date {
        format!("{} ", start.format("%a %d %b"))
    } else {
        String::new()
    };
    format!(
        "- [id {}] {day}{}-{} {}",
        event.id,
        start.format("%H:%M"),
        end.format("%H:%M"),
        event.title
    )
}
