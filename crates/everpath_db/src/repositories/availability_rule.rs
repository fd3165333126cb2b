//! Repository for agent working hours
//!
//! Weekly rules are keyed by (agent, location, weekday) and overrides by
//! (agent, location, date). Saving a rule replaces whatever was stored under its key;
//! rules are never deleted.

use crate::error::DbError;
use chrono::NaiveDate;
use std::future::Future;

pub use everpath_common::models::{AvailabilityRule, RuleKind};

pub trait AvailabilityRuleRepository {
    /// Store rules atomically; each one replaces the rule under the same key.
    fn save_rules(
        &self,
        rules: &[AvailabilityRule],
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Every weekly rule and override for the location.
    fn find_rules(
        &self,
        agent_id: &str,
        location: &str,
    ) -> impl Future<Output = Result<Vec<AvailabilityRule>, DbError>> + Send;

    /// Weekly rules plus only the overrides dated within `[from, to)`.
    fn find_rules_for_range(
        &self,
        agent_id: &str,
        location: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AvailabilityRule>, DbError>> + Send;
}
