use everpath_common::EverpathError;
use everpath_db::DbError;
use everpath_scheduling::SchedulingError;
use thiserror::Error;

/// Failures on the synchronous part of a booking (everything before the 201).
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent {0} is not approved for bookings")]
    AgentNotApproved(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Another active appointment holds the slot
    #[error("Requested slot is no longer available: {0}")]
    SlotConflict(String),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(String),

    #[error("Invalid booking request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::SlotTaken(msg) => BookingError::SlotConflict(msg),
            other => BookingError::Storage(other),
        }
    }
}

impl From<SchedulingError> for BookingError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::AgentNotFound(id) => BookingError::AgentNotFound(id),
            SchedulingError::Validation(msg) => BookingError::Validation(msg),
            SchedulingError::Storage(db) => db.into(),
        }
    }
}

impl From<BookingError> for EverpathError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::AgentNotFound(id) => EverpathError::NotFoundError(format!("agent {id}")),
            BookingError::AgentNotApproved(id) => {
                EverpathError::ForbiddenError(format!("agent {id} is not accepting bookings"))
            }
            BookingError::InvalidTimestamp(msg) | BookingError::Validation(msg) => {
                EverpathError::ValidationError(msg)
            }
            BookingError::SlotConflict(msg) => EverpathError::SlotConflictError(msg),
            BookingError::AppointmentNotFound(id) => {
                EverpathError::NotFoundError(format!("appointment {id}"))
            }
            BookingError::Storage(db) => db.into(),
        }
    }
}
