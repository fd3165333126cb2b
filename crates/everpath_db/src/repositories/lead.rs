//! Repository for family leads
//!
//! A lead is identified by its email address, compared case-insensitively.

use crate::error::DbError;
use std::future::Future;

pub use everpath_common::models::{Lead, LeadDetails};

pub trait LeadRepository {
    /// Return the lead stored under `details.email`, creating it on first contact.
    ///
    /// Contact fields of an existing lead are refreshed with the new values.
    fn resolve_or_create(
        &self,
        details: &LeadDetails,
    ) -> impl Future<Output = Result<Lead, DbError>> + Send;

    fn find_by_id(&self, lead_id: &str) -> impl Future<Output = Result<Option<Lead>, DbError>> + Send;
}
