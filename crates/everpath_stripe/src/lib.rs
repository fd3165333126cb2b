// --- File: crates/everpath_stripe/src/lib.rs ---

pub mod error;
pub mod logic;
#[cfg(test)]
mod logic_test;
pub mod service;

pub use error::StripeError;
pub use logic::{charge_customer, ChargeRequest, PaymentMethodLookup};
pub use service::StripePaymentService;
