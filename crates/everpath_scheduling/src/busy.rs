use crate::context::AgentContext;
use crate::error::SchedulingError;
use chrono::{DateTime, Utc};
use everpath_db::{
    AppointmentRepository, ExternalEventRepository, SqlAppointmentRepository,
    SqlExternalEventRepository,
};
use tracing::debug;

/// Half-open `[start, end)` span during which the agent cannot take a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// Sorts and merges overlapping intervals. Touching intervals stay separate.
pub fn merge_busy_periods(busy: &[BusyInterval]) -> Vec<BusyInterval> {
    let mut sorted: Vec<BusyInterval> = busy.iter().copied().filter(|b| b.end > b.start).collect();
    sorted.sort_by_key(|b| b.start);

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if interval.start < last.end => last.end = last.end.max(interval.end),
            _ => merged.push(interval),
        }
    }
    merged
}

/// Gathers an agent's busy time from bookings and mirrored calendar events.
#[derive(Debug, Clone)]
pub struct BusyIntervalCollector {
    appointments: SqlAppointmentRepository,
    external_events: SqlExternalEventRepository,
}

impl BusyIntervalCollector {
    pub fn new(
        appointments: SqlAppointmentRepository,
        external_events: SqlExternalEventRepository,
    ) -> Self {
        Self {
            appointments,
            external_events,
        }
    }

    /// Merged busy intervals intersecting `[from, to)`.
    ///
    /// Busy time is agent-wide: an appointment at any location blocks every location.
    pub async fn collect(
        &self,
        agent: &AgentContext,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, SchedulingError> {
        let length = agent.appointment_length;
        let appointments = self
            .appointments
            .find_active_between(&agent.agent_id, from - length, to)
            .await?;
        let events = self
            .external_events
            .find_busy_between(&agent.agent_id, from, to)
            .await?;

        let mut busy: Vec<BusyInterval> = appointments
            .iter()
            .filter(|a| a.status.blocks_time())
            .filter_map(|a| a.confirmed_at)
            .map(|start| BusyInterval::new(start, start + length))
            .filter(|b| b.overlaps(from, to))
            .collect();
        busy.extend(events.iter().map(|e| BusyInterval::new(e.starts_at, e.ends_at)));

        debug!(
            agent_id = %agent.agent_id,
            "Collected {} appointments and {} calendar events as busy time",
            appointments.len(),
            events.len()
        );
        Ok(merge_busy_periods(&busy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 6, h, m, 0).unwrap()
    }

    #[test]
    fn overlapping_intervals_merge() {
        let merged = merge_busy_periods(&[
            BusyInterval::new(at(10, 0), at(11, 0)),
            BusyInterval::new(at(9, 0), at(10, 30)),
            BusyInterval::new(at(13, 0), at(14, 0)),
        ]);
        assert_eq!(
            merged,
            vec![
                BusyInterval::new(at(9, 0), at(11, 0)),
                BusyInterval::new(at(13, 0), at(14, 0)),
            ]
        );
    }

    #[test]
    fn touching_intervals_stay_apart_and_empty_ones_vanish() {
        let merged = merge_busy_periods(&[
            BusyInterval::new(at(9, 0), at(10, 0)),
            BusyInterval::new(at(10, 0), at(11, 0)),
            BusyInterval::new(at(12, 0), at(12, 0)),
        ]);
        assert_eq!(merged.len(), 2);
        assert!(merge_busy_periods(&[]).is_empty());
    }
}
