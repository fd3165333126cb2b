//! Boundaries to collaborators the booking core does not own.
//!
//! Payment and notification delivery live behind these traits so the coordinator can be
//! wired with Stripe and a mail relay in production and with in-memory fakes in tests.

use crate::error::EverpathError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Result of a charge attempt that reached the provider.
///
/// A decline is a normal business outcome, not an error; errors are reserved for
/// transport and provider failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ChargeOutcome {
    Success { charge_id: String },
    Declined { reason: String },
}

/// Charges an agent's stored payment method.
pub trait PaymentService: Send + Sync {
    /// Charge `amount_minor_units` to `customer_ref`.
    ///
    /// Providers must deduplicate on `idempotency_key`, so retrying with the same key never
    /// double-charges.
    fn charge(
        &self,
        customer_ref: &str,
        amount_minor_units: i64,
        idempotency_key: &str,
    ) -> BoxFuture<'_, ChargeOutcome, EverpathError>;
}

/// Events the core asks the mail layer to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    BookingConfirmedFamily,
    BookingConfirmedAgent,
    BookingCancelled,
    PaymentDeclined,
    CalendarReconnectRequired,
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationEvent::BookingConfirmedFamily => "booking_confirmed_family",
            NotificationEvent::BookingConfirmedAgent => "booking_confirmed_agent",
            NotificationEvent::BookingCancelled => "booking_cancelled",
            NotificationEvent::PaymentDeclined => "payment_declined",
            NotificationEvent::CalendarReconnectRequired => "calendar_reconnect_required",
        };
        f.write_str(name)
    }
}

/// Delivers a templated message; rendering happens downstream.
pub trait NotificationService: Send + Sync {
    fn send(
        &self,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> BoxFuture<'_, (), EverpathError>;
}
