//! Decides whether a requested booking collides with an active appointment.
//!
//! Two tests, either of which is a conflict:
//! * an existing start lies within the tolerance (60 s by default) of the requested start;
//! * the intervals overlap, taking the requested slot's duration for the existing booking.

use crate::error::SchedulingError;
use chrono::{DateTime, Duration, Utc};
use everpath_db::{AppointmentRepository, SlotGuard, SqlAppointmentRepository};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictCheck {
    Free,
    Conflict { appointment_id: String },
}

impl ConflictCheck {
    pub fn is_free(&self) -> bool {
        matches!(self, ConflictCheck::Free)
    }
}

/// A requested `[start, end)` plus the tolerance it is checked with.
///
/// Also the in-transaction guard handed to the appointment repository, so the re-check
/// after the lock uses exactly the same rule as the pre-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClaim {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tolerance: Duration,
}

impl SlotClaim {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, tolerance: Duration) -> Self {
        Self {
            start,
            end,
            tolerance,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn collides_with(&self, other_start: DateTime<Utc>) -> bool {
        let near_start = (other_start - self.start).abs() <= self.tolerance;
        let overlaps = self.start < other_start + self.duration() && self.end > other_start;
        near_start || overlaps
    }
}

impl SlotGuard for SlotClaim {
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let reach_back = self.duration().max(self.tolerance);
        let reach_forward = (self.start + self.tolerance).max(self.end);
        (self.start - reach_back, reach_forward)
    }

    fn admits(&self, existing_starts: &[DateTime<Utc>]) -> bool {
        !existing_starts.iter().any(|s| self.collides_with(*s))
    }
}

#[derive(Debug, Clone)]
pub struct SlotConflictChecker {
    appointments: SqlAppointmentRepository,
    tolerance: Duration,
}

impl SlotConflictChecker {
    pub fn new(appointments: SqlAppointmentRepository, tolerance_seconds: i64) -> Self {
        Self {
            appointments,
            tolerance: Duration::seconds(tolerance_seconds.max(0)),
        }
    }

    pub fn claim(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> SlotClaim {
        SlotClaim::new(start, end, self.tolerance)
    }

    /// Checks `[start, end)` against the agent's pending and confirmed appointments.
    ///
    /// `excluding` names an appointment that is being replaced and must not block itself.
    pub async fn check(
        &self,
        agent_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        excluding: Option<&str>,
    ) -> Result<ConflictCheck, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(
                "requested end must be after start".to_string(),
            ));
        }

        let claim = self.claim(start, end);
        let (from, to) = claim.window();
        // find_active_between is end-exclusive; the window is inclusive.
        let candidates = self
            .appointments
            .find_active_between(agent_id, from, to + Duration::milliseconds(1))
            .await?;

        let clash = candidates
            .iter()
            .filter(|a| Some(a.id.as_str()) != excluding)
            .filter(|a| a.status.blocks_time())
            .find(|a| a.confirmed_at.is_some_and(|at| claim.collides_with(at)));

        match clash {
            Some(existing) => {
                info!(
                    agent_id,
                    appointment_id = %existing.id,
                    "Requested slot {} collides with an existing booking",
                    start
                );
                Ok(ConflictCheck::Conflict {
                    appointment_id: existing.id.clone(),
                })
            }
            None => {
                debug!(agent_id, "Slot {} - {} is free", start, end);
                Ok(ConflictCheck::Free)
            }
        }
    }
}
