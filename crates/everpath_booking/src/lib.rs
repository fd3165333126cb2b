// --- File: crates/everpath_booking/src/lib.rs ---
pub mod coordinator;
#[cfg(test)]
mod coordinator_test;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod notify;
#[cfg(test)]
mod notify_test;
pub mod routes;
#[cfg(test)]
mod test_support;

pub use coordinator::{
    BookingOutcome, BookingRequest, BookingTransactionCoordinator, CalendarReport, CancelOutcome,
    NotificationReport, PaymentReport, SideEffectReport,
};
pub use error::BookingError;
pub use notify::{notifier_from_config, HttpNotifier, LoggingNotifier};
