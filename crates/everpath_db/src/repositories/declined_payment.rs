//! Audit trail of charges the payment provider refused.

use crate::error::DbError;
use std::future::Future;

pub use everpath_common::models::DeclinedPayment;

pub trait DeclinedPaymentRepository {
    fn record(&self, declined: &DeclinedPayment) -> impl Future<Output = Result<(), DbError>> + Send;

    fn find_by_appointment(
        &self,
        appointment_id: &str,
    ) -> impl Future<Output = Result<Vec<DeclinedPayment>, DbError>> + Send;
}
