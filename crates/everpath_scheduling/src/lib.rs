// --- File: crates/everpath_scheduling/src/lib.rs ---
pub mod availability;
pub mod busy;
pub mod conflict;
pub mod context;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod slots;
#[cfg(test)]
mod slots_proptest;
#[cfg(test)]
mod test_support;
pub mod timezone;

pub use availability::{AvailabilityResolver, AvailabilityResponse, DayAvailability};
pub use busy::{merge_busy_periods, BusyInterval, BusyIntervalCollector};
pub use conflict::{ConflictCheck, SlotClaim, SlotConflictChecker};
pub use context::AgentContext;
pub use error::SchedulingError;
pub use slots::{generate_slots, DaySlots, Slot};
pub use timezone::{resolve_timezone, FALLBACK_TIMEZONE};
