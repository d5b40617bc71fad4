use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::{checkout, from_ts, open_pool, to_ts, SqlitePool, SqlitePooledConn};
use crate::domains::event::CalendarEvent;
use crate::error::{AssistantError, Result};

use super::schema::calendar_events;

#[derive(Queryable)]
struct EventRow {
    id: i32,
    owner_id: i32,
    title: String,
    description: Option<String>,
    start_time: i64,
    end_time: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = calendar_events)]
struct NewEventRow<'a> {
    owner_id: i32,
    title: &'a str,
    description: Option<&'a str>,
    start_time: i64,
    end_time: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = calendar_events)]
#[diesel(treat_none_as_null = true)]
struct EventChangeset<'a> {
    title: &'a str,
    description: Option<&'a str>,
    start_time: i64,
    end_time: Option<i64>,
    updated_at: i64,
}

/// Already-normalized fields of a new event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Diesel-backed persistence for calendar events. Every query is scoped by
/// owner.
pub struct EventStore {
    pool: SqlitePool,
    owner_locks: Mutex<HashMap<i32, Arc<Mutex<()>>>>,
}

impl EventStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = open_pool(sqlite_path.as_ref()).await?;
        Ok(Self {
            pool,
            owner_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Serializes mutations of one owner's events within this process.
    /// Locks nobody holds or waits on are dropped from the map.
    pub async fn lock_owner(&self, owner_id: i32) -> OwnedMutexGuard<()> {
        let lock = {
            let mut guard = self.owner_locks.lock().await;
            guard.retain(|_, lock| Arc::strong_count(lock) > 1);
            guard
                .entry(owner_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Owners with a live lock entry.
    pub async fn tracked_owner_locks(&self) -> usize {
        self.owner_locks.lock().await.len()
    }

    /// Events with `start < window_end` and an end that is either missing or
    /// after `window_start`, ordered by start.
    pub async fn events_overlapping(
        &self,
        owner_id: i32,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> = calendar_events::table
            .filter(calendar_events::owner_id.eq(owner_id))
            .filter(calendar_events::start_time.lt(to_ts(window_end)))
            .filter(
                calendar_events::end_time
                    .is_null()
                    .or(calendar_events::end_time.gt(to_ts(window_start))),
            )
            .order((calendar_events::start_time.asc(), calendar_events::id.asc()))
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    /// Events whose start falls in `[from, to)`.
    pub async fn events_starting_between(
        &self,
        owner_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> = calendar_events::table
            .filter(calendar_events::owner_id.eq(owner_id))
            .filter(calendar_events::start_time.ge(to_ts(from)))
            .filter(calendar_events::start_time.lt(to_ts(to)))
            .order((calendar_events::start_time.asc(), calendar_events::id.asc()))
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn get_event(&self, owner_id: i32, id: i32) -> Result<Option<CalendarEvent>> {
        let mut conn = self.conn().await?;
        let row: Option<EventRow> = calendar_events::table
            .filter(calendar_events::owner_id.eq(owner_id))
            .filter(calendar_events::id.eq(id))
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(map_row))
    }

    /// Inserts `record` unless it overlaps an existing event of the same
    /// owner. The overlap check and the insert share one transaction and run
    /// under the owner lock.
    pub async fn insert_if_free(
        &self,
        owner_id: i32,
        record: &EventRecord,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvent> {
        let _owner_guard = self.lock_owner(owner_id).await;
        let start = record.start_time;
        let occupied_until = record
            .end_time
            .unwrap_or(start + crate::domains::event::default_event_duration());
        let new = NewEventRow {
            owner_id,
            title: &record.title,
            description: record.description.as_deref(),
            start_time: to_ts(start),
            end_time: record.end_time.map(to_ts),
            created_at: to_ts(now),
            updated_at: to_ts(now),
        };

        let mut conn = self.conn().await?;
        let row = conn
            .transaction::<_, AssistantError, _>(|conn| {
                async move {
                    let candidates: Vec<EventRow> = calendar_events::table
                        .filter(calendar_events::owner_id.eq(owner_id))
                        .filter(calendar_events::start_time.lt(to_ts(occupied_until)))
                        .filter(
                            calendar_events::end_time
                                .is_null()
                                .or(calendar_events::end_time.gt(to_ts(start))),
                        )
                        .order((calendar_events::start_time.asc(), calendar_events::id.asc()))
                        .load(conn)
                        .await?;
                    if let Some(conflict) = candidates
                        .into_iter()
                        .map(map_row)
                        .find(|existing| existing.overlaps(start, occupied_until))
                    {
                        return Err(AssistantError::Conflict {
                            event: Box::new(conflict),
                        });
                    }

                    diesel::insert_into(calendar_events::table)
                        .values(&new)
                        .execute(conn)
                        .await?;

                    let row: EventRow = calendar_events::table
                        .filter(calendar_events::owner_id.eq(owner_id))
                        .order(calendar_events::id.desc())
                        .first(conn)
                        .await?;
                    Ok(row)
                }
                .scope_boxed()
            })
            .await?;
        Ok(map_row(row))
    }

    /// Overwrites the mutable fields of an owned event. Returns `None` when no
    /// such event exists for the owner.
    pub async fn update_event(
        &self,
        owner_id: i32,
        id: i32,
        record: &EventRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>> {
        let changes = EventChangeset {
            title: &record.title,
            description: record.description.as_deref(),
            start_time: to_ts(record.start_time),
            end_time: record.end_time.map(to_ts),
            updated_at: to_ts(now),
        };
        let mut conn = self.conn().await?;
        let updated = diesel::update(
            calendar_events::table
                .filter(calendar_events::owner_id.eq(owner_id))
                .filter(calendar_events::id.eq(id)),
        )
        .set(&changes)
        .execute(&mut conn)
        .await?;
        if updated == 0 {
            return Ok(None);
        }
        drop(conn);
        self.get_event(owner_id, id).await
    }

    pub async fn delete_event(&self, owner_id: i32, id: i32) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(
            calendar_events::table
                .filter(calendar_events::owner_id.eq(owner_id))
                .filter(calendar_events::id.eq(id)),
        )
        .execute(&mut conn)
        .await?;
        Ok(deleted > 0)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        checkout(&self.pool).await
    }
}

fn map_row(row: EventRow) -> CalendarEvent {
    CalendarEvent {
        id: row.id,
        owner_id: row.owner_id,
        title: row.title,
        description: row.description,
        start_time: from_ts(row.start_time),
        end_time: row.end_time.map(from_ts),
        created_at: from_ts(row.created_at),
        updated_at: from_ts(row.updated_at),
    }
}
