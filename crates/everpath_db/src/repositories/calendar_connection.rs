//! Repository for OAuth-linked provider calendars
//!
//! One connection per (agent, provider). Tokens are rewritten on every refresh, and the
//! webhook channel columns track the provider push subscription.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use std::future::Future;

pub use everpath_common::models::{CalendarConnection, Provider};

/// Provider push channel as stored on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub resource_id: String,
    pub expires_at: DateTime<Utc>,
}

pub trait CalendarConnectionRepository {
    /// Insert or replace the connection for `(agent_id, provider)`, returning the stored row.
    fn upsert(
        &self,
        connection: &CalendarConnection,
    ) -> impl Future<Output = Result<CalendarConnection, DbError>> + Send;

    fn find_by_id(
        &self,
        connection_id: &str,
    ) -> impl Future<Output = Result<Option<CalendarConnection>, DbError>> + Send;

    fn find_by_agent(
        &self,
        agent_id: &str,
    ) -> impl Future<Output = Result<Vec<CalendarConnection>, DbError>> + Send;

    fn find_by_channel_id(
        &self,
        channel_id: &str,
    ) -> impl Future<Output = Result<Option<CalendarConnection>, DbError>> + Send;

    /// Store a refreshed token pair. Returns `false` if the connection is gone.
    fn update_tokens(
        &self,
        connection_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Stop syncing after the provider revoked our grant.
    fn disable_sync(&self, connection_id: &str) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Replace (or clear, with `None`) the push channel of a connection.
    fn set_channel(
        &self,
        connection_id: &str,
        channel: Option<&ChannelRecord>,
    ) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Sync-enabled connections whose channel is missing or expires before `before`.
    fn find_channels_expiring_before(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<CalendarConnection>, DbError>> + Send;
}
