//! Repository for mirrored provider calendar events
//!
//! Rows are keyed by (specialist, provider, provider event id). Removing a row through
//! [`ExternalEventRepository::delete_with_tombstone`] records a tombstone, and
//! [`ExternalEventRepository::upsert`] refuses to write an id that carries one.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::future::Future;

pub use everpath_common::models::{ExternalEvent, ExternalEventStatus, Provider};

pub trait ExternalEventRepository {
    /// Insert or update the mirror row. Returns `false` when the id is tombstoned.
    fn upsert(&self, event: &ExternalEvent) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Platform-created events written for an appointment.
    fn find_for_appointment(
        &self,
        appointment_id: &str,
    ) -> impl Future<Output = Result<Vec<ExternalEvent>, DbError>> + Send;

    /// Confirmed events of the specialist, any provider, overlapping `[from, to)`.
    fn find_busy_between(
        &self,
        specialist_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ExternalEvent>, DbError>> + Send;

    /// Every mirror row of one provider overlapping `[from, to)`.
    fn find_in_window(
        &self,
        specialist_id: &str,
        provider: Provider,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ExternalEvent>, DbError>> + Send;

    /// Remove the row and tombstone its id in one transaction.
    fn delete_with_tombstone(
        &self,
        specialist_id: &str,
        provider: Provider,
        provider_event_id: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Remove the row without a tombstone; the provider may bring it back later.
    fn delete_row(
        &self,
        specialist_id: &str,
        provider: Provider,
        provider_event_id: &str,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;

    fn tombstoned_ids(
        &self,
        specialist_id: &str,
        provider: Provider,
    ) -> impl Future<Output = Result<HashSet<String>, DbError>> + Send;
}
