use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::domains::event::{CalendarEvent, FreeSlot};
use crate::timezone::local_to_utc;

/// A busy `[start, end)` range in UTC.
pub type BusyInterval = (DateTime<Utc>, DateTime<Utc>);

/// Collapses overlapping or touching events into sorted, disjoint busy
/// ranges. An event without an end occupies one hour. Events with equal
/// starts keep their input order.
pub fn merge_busy(events: &[CalendarEvent]) -> Vec<BusyInterval> {
    let mut intervals: Vec<BusyInterval> = events
        .iter()
        .map(|ev| (ev.start_time, ev.effective_end()))
        .collect();
    intervals.sort_by_key(|(start, _)| *start);

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => {
                if end > last.1 {
                    last.1 = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Gaps of at least `min_minutes` inside working hours, scanning `days` local
/// days starting at `from`. On the first day the scan starts no earlier than
/// `from` itself.
pub fn find_free_slots(
    events: &[CalendarEvent],
    from: DateTime<Tz>,
    days: i64,
    min_minutes: i64,
    workday_start: NaiveTime,
    workday_end: NaiveTime,
) -> Vec<FreeSlot> {
    let tz = from.timezone();
    let busy = merge_busy(events);
    let min_gap = Duration::minutes(min_minutes.max(0));
    let from_utc = from.with_timezone(&Utc);
    let first_day = from.date_naive();

    let mut slots = Vec::new();
    let mut next_busy = 0usize;

    for offset in 0..days.max(0) {
        let day = first_day + Duration::days(offset);
        let mut cursor = local_to_utc(day.and_time(workday_start), tz);
        let day_end = local_to_utc(day.and_time(workday_end), tz);
        if offset == 0 && cursor < from_utc {
            cursor = from_utc;
        }
        if cursor >= day_end {
            continue;
        }

        while next_busy < busy.len() && busy[next_busy].1 <= cursor {
            next_busy += 1;
        }

        let mut idx = next_busy;
        while cursor < day_end {
            let (busy_start, busy_end) = busy.get(idx).copied().unwrap_or((day_end, day_end));
            let gap_end = busy_start.min(day_end);
            if cursor < gap_end {
                push_slot(&mut slots, cursor, gap_end, min_gap, tz);
            }
            if busy_start >= day_end {
                break;
            }
            if busy_end > cursor {
                cursor = busy_end;
            }
            idx += 1;
        }
    }
    slots
}

fn push_slot(
    slots: &mut Vec<FreeSlot>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    min_gap: Duration,
    tz: Tz,
) {
    let length = end - start;
    if length <= Duration::zero() || length < min_gap {
        return;
    }
    slots.push(FreeSlot {
        start: start.with_timezone(&tz),
        end: end.with_timezone(&tz),
        duration_minutes: length.num_minutes(),
    });
}
