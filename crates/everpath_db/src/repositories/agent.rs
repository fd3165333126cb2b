//! Repository for agent profiles
//!
//! Profile CRUD belongs to onboarding; the booking core reads agents and flips the
//! `paused` flag after a declined charge.

use crate::error::DbError;
use std::future::Future;

pub use everpath_common::models::Agent;

pub trait AgentRepository {
    /// Insert or replace an agent profile.
    fn upsert(&self, agent: &Agent) -> impl Future<Output = Result<(), DbError>> + Send;

    fn find_by_id(
        &self,
        agent_id: &str,
    ) -> impl Future<Output = Result<Option<Agent>, DbError>> + Send;

    /// Excludes the agent from marketplace search until billing is fixed.
    ///
    /// Returns `false` if no such agent exists.
    fn set_paused(
        &self,
        agent_id: &str,
        paused: bool,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;
}
