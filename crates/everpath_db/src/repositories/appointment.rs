//! Repository for appointments
//!
//! Booking writes go through [`AppointmentRepository::insert_guarded`], which re-runs the
//! caller's conflict test inside the write transaction. A unique index on
//! `(agent_id, confirmed_slot)` backs it up, so two writers can never both commit the same
//! minute for one agent.

use crate::error::DbError;
use crate::timestamps::to_millis;
use chrono::{DateTime, Utc};
use std::future::Future;

pub use everpath_common::models::{Appointment, AppointmentStatus};

/// Width of the uniqueness bucket `confirmed_slot` is floored to.
pub const SLOT_BUCKET_MS: i64 = 60_000;

pub fn slot_bucket(confirmed_at: DateTime<Utc>) -> i64 {
    to_millis(confirmed_at).div_euclid(SLOT_BUCKET_MS)
}

/// Conflict test evaluated against the committed state inside the booking transaction.
pub trait SlotGuard: Send + Sync {
    /// Inclusive range of existing start instants that could collide with the candidate.
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>);

    /// Whether the candidate may be written given the active starts inside [`Self::window`].
    fn admits(&self, existing_starts: &[DateTime<Utc>]) -> bool;
}

pub trait AppointmentRepository {
    /// Atomically cancel `replaces` (if given), re-check `guard`, and insert `appointment`.
    ///
    /// Fails with [`DbError::SlotTaken`] when the guard rejects or the unique index fires.
    fn insert_guarded(
        &self,
        appointment: &Appointment,
        guard: &dyn SlotGuard,
        replaces: Option<&str>,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    fn find_by_id(
        &self,
        appointment_id: &str,
    ) -> impl Future<Output = Result<Option<Appointment>, DbError>> + Send;

    /// Pending or confirmed appointments of `agent_id` starting within `[from, to)`.
    fn find_active_between(
        &self,
        agent_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Appointment>, DbError>> + Send;

    /// Mark an appointment cancelled and release its slot. `None` if it does not exist.
    fn cancel(
        &self,
        appointment_id: &str,
    ) -> impl Future<Output = Result<Option<Appointment>, DbError>> + Send;

    fn set_payment_charge_ref(
        &self,
        appointment_id: &str,
        charge_ref: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}
