//! Turns working-hours rules into bookable slots.
//!
//! Local rule times are resolved to absolute instants per date in the agent's zone, then the
//! window is sliced in absolute time. On a daylight-saving change the local start and end
//! stay put while their UTC instants move by the offset change.

use crate::error::SchedulingError;
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use everpath_common::models::{AvailabilityRule, RuleKind};
use serde::Serialize;
use tracing::debug;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Longest local-time gap we step across when a rule boundary falls inside one.
const MAX_GAP_MINUTES: i64 = 24 * 60;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "2030-05-06T16:00:00Z"))]
    pub starts_at: DateTime<Utc>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "2030-05-06T16:30:00Z"))]
    pub ends_at: DateTime<Utc>,
}

impl Slot {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.starts_at < end && self.ends_at > start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// The rule in force on `date`: an override beats the weekly rule, a disabled weekly rule
/// means no hours.
pub fn effective_window(rules: &[AvailabilityRule], date: NaiveDate) -> Option<(NaiveTime, NaiveTime)> {
    let override_rule = rules.iter().find_map(|rule| match rule.kind {
        RuleKind::DailyOverride {
            date: d,
            start_local,
            end_local,
        } if d == date => Some((start_local, end_local)),
        _ => None,
    });
    if override_rule.is_some() {
        return override_rule;
    }

    rules.iter().find_map(|rule| match rule.kind {
        RuleKind::Recurring {
            weekday,
            enabled: true,
            start_local,
            end_local,
        } if weekday == date.weekday() => Some((start_local, end_local)),
        _ => None,
    })
}

/// Resolves a wall-clock time on `date` to an instant in `tz`.
///
/// Ambiguous times take the earlier instant; times inside a gap move forward to the first
/// instant that exists.
pub fn resolve_local(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    let mut probe = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => probe += Duration::minutes(1),
        }
    }
    None
}

/// Slots for every date in `[from, to)`, one entry per date even when it has no hours.
///
/// Slots that start at or before `now` are dropped, and a remainder shorter than `length` at
/// the end of a window is discarded.
pub fn generate_slots(
    rules: &[AvailabilityRule],
    tz: Tz,
    from: NaiveDate,
    to: NaiveDate,
    length: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<DaySlots>, SchedulingError> {
    if length <= Duration::zero() {
        return Err(SchedulingError::Validation(
            "slot length must be positive".to_string(),
        ));
    }

    let mut days = Vec::new();
    for date in from.iter_days().take_while(|d| *d < to) {
        let slots = match effective_window(rules, date) {
            Some((start_local, end_local)) => {
                slice_window(tz, date, start_local, end_local, length, now)
            }
            None => Vec::new(),
        };
        days.push(DaySlots { date, slots });
    }

    debug!(
        "Generated {} slots across {} days in {}",
        days.iter().map(|d| d.slots.len()).sum::<usize>(),
        days.len(),
        tz.name()
    );
    Ok(days)
}

fn slice_window(
    tz: Tz,
    date: NaiveDate,
    start_local: NaiveTime,
    end_local: NaiveTime,
    length: Duration,
    now: DateTime<Utc>,
) -> Vec<Slot> {
    let (Some(window_start), Some(window_end)) = (
        resolve_local(tz, date, start_local),
        resolve_local(tz, date, end_local),
    ) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    let mut starts_at = window_start;
    while let Some(ends_at) = starts_at.checked_add_signed(length) {
        if ends_at > window_end {
            break;
        }
        if starts_at > now {
            slots.push(Slot { starts_at, ends_at });
        }
        starts_at = ends_at;
    }
    slots
}
