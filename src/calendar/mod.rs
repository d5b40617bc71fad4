//! Event Store: one user's events with their temporal invariants.

pub mod format;
pub mod free_slots;
mod schema;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::domains::event::{
    CalendarEvent, DeleteOutcome, EventEnd, EventPatch, FreeSlot, LocalWindow, NewEventInput,
};
use crate::domains::user::User;
use crate::error::{AssistantError, Result};
use crate::timezone::{
    local_day_bounds, local_days_bounds, parse_instant, timezone_or_utc, to_utc,
    validate_and_convert_times, InstantInput,
};

pub use self::store::{EventRecord, EventStore};

/// Owner-scoped view over an [`EventStore`] that knows the owner's timezone.
#[derive(Clone)]
pub struct CalendarService {
    store: Arc<EventStore>,
    owner_id: i32,
    tz: Tz,
}

impl CalendarService {
    pub fn new(store: Arc<EventStore>, user: &User) -> Self {
        Self::with_timezone(store, user.id, timezone_or_utc(&user.timezone))
    }

    pub fn with_timezone(store: Arc<EventStore>, owner_id: i32, tz: Tz) -> Self {
        Self {
            store,
            owner_id,
            tz,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn owner_id(&self) -> i32 {
        self.owner_id
    }

    pub async fn events_overlapping(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        self.store
            .events_overlapping(self.owner_id, window_start, window_end)
            .await
    }

    pub async fn events_in_window(&self, window: &LocalWindow) -> Result<Vec<CalendarEvent>> {
        let (start, end) = window.to_utc();
        self.events_overlapping(start, end).await
    }

    pub async fn events_for_day(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let (start, end) = local_day_bounds(date, self.tz);
        self.events_overlapping(start, end).await
    }

    /// Seven local days from the Monday of `date`'s week.
    pub async fn events_for_week(&self, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        let (start, end) = local_days_bounds(monday, 7, self.tz);
        self.events_overlapping(start, end).await
    }

    /// Events whose start lies in `[from, to)`.
    pub async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        self.store
            .events_starting_between(self.owner_id, from, to)
            .await
    }

    pub async fn find_free_slots(
        &self,
        from: DateTime<Tz>,
        days: i64,
        min_minutes: i64,
        workday_start: NaiveTime,
        workday_end: NaiveTime,
    ) -> Result<Vec<FreeSlot>> {
        let from = from.with_timezone(&self.tz);
        let (_, scan_end) = local_days_bounds(from.date_naive(), days.max(1), self.tz);
        let events = self
            .events_overlapping(from.with_timezone(&Utc), scan_end)
            .await?;
        Ok(free_slots::find_free_slots(
            &events,
            from,
            days,
            min_minutes,
            workday_start,
            workday_end,
        ))
    }

    /// Validates, normalizes and inserts a new event. Refuses past starts and
    /// any overlap with the owner's existing events.
    pub async fn create_event(
        &self,
        input: &NewEventInput,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvent> {
        let title = required_title(&input.title)?;
        let start = parse_instant(&input.start)?;
        let (start_utc, end_utc) = match &input.end {
            EventEnd::Default => validate_and_convert_times(&start, None, self.tz)?,
            EventEnd::At(raw) => {
                let end = parse_instant(raw)?;
                validate_and_convert_times(&start, Some(&end), self.tz)?
            }
            EventEnd::After(length) => {
                let start_utc = to_utc(&start, self.tz);
                let end_utc = start_utc.checked_add_signed(*length).ok_or_else(|| {
                    AssistantError::Validation(format!(
                        "event length of {} minutes is out of range",
                        length.num_minutes()
                    ))
                })?;
                let end = InstantInput::from(end_utc);
                validate_and_convert_times(&start, Some(&end), self.tz)?
            }
        };
        if start_utc < now {
            return Err(AssistantError::PastTime { when: start_utc });
        }

        let record = EventRecord {
            title,
            description: clean_description(input.description.as_deref()),
            start_time: start_utc,
            end_time: Some(end_utc),
        };
        let event = self.store.insert_if_free(self.owner_id, &record, now).await?;
        info!(
            owner_id = self.owner_id,
            event_id = event.id,
            start = %event.start_time,
            "calendar event created"
        );
        Ok(event)
    }

    pub async fn get_event(&self, id: i32) -> Result<CalendarEvent> {
        self.store
            .get_event(self.owner_id, id)
            .await?
            .ok_or_else(|| AssistantError::NotFound(format!("event {id}")))
    }

    /// Merges `patch` into the stored event. The merged range must still be
    /// valid; overlaps with other events are not re-checked.
    pub async fn update_event(
        &self,
        id: i32,
        patch: &EventPatch,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvent> {
        let existing = self.get_event(id).await?;
        let title = match &patch.title {
            Some(title) => required_title(title)?,
            None => existing.title.clone(),
        };
        let description = match &patch.description {
            Some(value) => clean_description(value.as_deref()),
            None => existing.description.clone(),
        };
        let start_time = match &patch.start {
            Some(raw) => to_utc(&parse_instant(raw)?, self.tz),
            None => existing.start_time,
        };
        let end_time = match &patch.end {
            Some(raw) => Some(to_utc(&parse_instant(raw)?, self.tz)),
            None => existing.end_time,
        };
        if let Some(end) = end_time {
            if end <= start_time {
                return Err(AssistantError::InvalidRange {
                    start: start_time,
                    end,
                });
            }
        }

        let record = EventRecord {
            title,
            description,
            start_time,
            end_time,
        };
        let updated = self
            .store
            .update_event(self.owner_id, id, &record, now)
            .await?
            .ok_or_else(|| AssistantError::NotFound(format!("event {id}")))?;
        info!(owner_id = self.owner_id, event_id = id, "calendar event updated");
        Ok(updated)
    }

    /// Deletes an owned event and returns it.
    pub async fn delete_event(&self, id: i32) -> Result<CalendarEvent> {
        let _owner_guard = self.store.lock_owner(self.owner_id).await;
        let event = self.get_event(id).await?;
        if !self.store.delete_event(self.owner_id, id).await? {
            return Err(AssistantError::NotFound(format!("event {id}")));
        }
        info!(owner_id = self.owner_id, event_id = id, "calendar event deleted");
        Ok(event)
    }

    /// Deletes the single event starting on local `date` whose title contains
    /// `title` (case-insensitive). With `start`, only an event starting at
    /// exactly that instant qualifies. Several matches are reported, never
    /// resolved by guessing.
    pub async fn delete_event_by_title_and_date(
        &self,
        title: &str,
        date: NaiveDate,
        start: Option<&InstantInput>,
    ) -> Result<DeleteOutcome> {
        let needle = title.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AssistantError::Validation(
                "title is required to find the event".to_string(),
            ));
        }
        let exact_start = start.map(|instant| to_utc(instant, self.tz));

        let _owner_guard = self.store.lock_owner(self.owner_id).await;
        let (day_start, day_end) = local_day_bounds(date, self.tz);
        let mut candidates: Vec<CalendarEvent> = self
            .store
            .events_starting_between(self.owner_id, day_start, day_end)
            .await?
            .into_iter()
            .filter(|event| event.title.to_lowercase().contains(&needle))
            .filter(|event| exact_start.map_or(true, |at| event.start_time == at))
            .collect();

        match candidates.len() {
            0 => Ok(DeleteOutcome::NotFound),
            1 => {
                let event = candidates.remove(0);
                if !self.store.delete_event(self.owner_id, event.id).await? {
                    return Ok(DeleteOutcome::NotFound);
                }
                info!(
                    owner_id = self.owner_id,
                    event_id = event.id,
                    "calendar event deleted by title"
                );
                Ok(DeleteOutcome::Deleted(event))
            }
            _ => Ok(DeleteOutcome::Ambiguous(candidates)),
        }
    }
}

fn required_title(raw: &str) -> Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(AssistantError::Validation("event title is required".to_string()));
    }
    Ok(title.to_string())
}

fn clean_description(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
