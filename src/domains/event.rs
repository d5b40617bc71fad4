use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// Length assumed for an event whose end is unknown.
pub const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

pub fn default_event_duration() -> Duration {
    Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES)
}

/// A stored calendar event. All instants are UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// End used for overlap checks: a missing end counts as one hour.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time
            .unwrap_or(self.start_time + default_event_duration())
    }

    /// Half-open overlap against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.effective_end()
    }
}

/// An event projected into a user's timezone for display.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEvent {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Tz>,
    pub end_time: Option<DateTime<Tz>>,
    pub created_at: DateTime<Tz>,
    pub updated_at: DateTime<Tz>,
}

/// Fields accepted when creating an event. Instants are raw user input and
/// are normalized against the owner's timezone.
#[derive(Debug, Clone, Default)]
pub struct NewEventInput {
    pub title: String,
    pub start: String,
    pub end: EventEnd,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventEnd {
    #[default]
    Default,
    At(String),
    After(Duration),
}

/// Partial update. `None` leaves a field untouched; `description: Some(None)`
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// A gap between busy intervals, in the user's timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeSlot {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub duration_minutes: i64,
}

/// A half-open `[start, end)` window in a user's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl LocalWindow {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self { start, end }
    }

    pub fn to_utc(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start.with_timezone(&Utc),
            self.end.with_timezone(&Utc),
        )
    }

    /// Number of local calendar days touched by the window, at least one.
    pub fn days(&self) -> i64 {
        let first = self.start.date_naive();
        let last = (self.end - Duration::seconds(1)).date_naive();
        ((last - first).num_days() + 1).max(1)
    }

    pub fn is_single_day(&self) -> bool {
        self.days() == 1
    }
}

/// Result of a title/date based deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(CalendarEvent),
    NotFound,
    Ambiguous(Vec<CalendarEvent>),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted(_))
    }

    /// The deleted event, or the matching `NotFound`/`AmbiguousTarget` error.
    pub fn into_result(self, what: &str) -> Result<CalendarEvent> {
        match self {
            DeleteOutcome::Deleted(event) => Ok(event),
            DeleteOutcome::NotFound => Err(AssistantError::NotFound(what.to_string())),
            DeleteOutcome::Ambiguous(candidates) => {
                Err(AssistantError::AmbiguousTarget { candidates })
            }
        }
    }
}
