//! Keeps calendar access tokens fresh.
//!
//! Refreshes for one connection are serialized through a per-connection async mutex, and the
//! connection is re-read under the lock, so concurrent callers end up sharing a single refresh.

use crate::error::CalendarError;
use crate::provider::ProviderRegistry;
use chrono::{DateTime, Duration, Utc};
use everpath_common::models::CalendarConnection;
use everpath_common::services::{NotificationEvent, NotificationService};
use everpath_db::{CalendarConnectionRepository, SqlCalendarConnectionRepository};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Tokens this close to expiry are treated as expired.
pub const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Clone)]
pub struct OAuthTokenManager {
    connections: SqlCalendarConnectionRepository,
    providers: ProviderRegistry,
    notifier: Option<Arc<dyn NotificationService>>,
    locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OAuthTokenManager {
    pub fn new(connections: SqlCalendarConnectionRepository, providers: ProviderRegistry) -> Self {
        Self {
            connections,
            providers,
            notifier: None,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Tell the agent when a connection has to be re-authorized.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationService>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Returns a usable access token, refreshing and persisting it first when needed.
    ///
    /// A revoked grant disables sync on the connection and yields
    /// [`CalendarError::ReconnectRequired`]; that outcome is terminal until the agent
    /// reconnects.
    pub async fn ensure_valid_access_token(
        &self,
        connection: &CalendarConnection,
    ) -> Result<String, CalendarError> {
        if !connection.sync_enabled {
            return Err(CalendarError::ReconnectRequired(connection.id.clone()));
        }
        let now = Utc::now();
        if !needs_refresh(connection.token_expires_at, now) {
            return Ok(connection.access_token.clone());
        }

        let lock = self.lock_for(&connection.id);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_stale(connection).await
        };
        self.release_lock(&connection.id, lock);
        result
    }

    /// Runs under the connection's lock: re-reads the row so concurrent callers refresh once.
    async fn refresh_if_stale(&self, connection: &CalendarConnection) -> Result<String, CalendarError> {
        let current = self
            .connections
            .find_by_id(&connection.id)
            .await?
            .ok_or_else(|| CalendarError::NotFound(format!("calendar connection {}", connection.id)))?;
        if !current.sync_enabled {
            return Err(CalendarError::ReconnectRequired(current.id));
        }
        if !needs_refresh(current.token_expires_at, Utc::now()) {
            debug!(connection_id = %current.id, "Token was refreshed by a concurrent caller");
            return Ok(current.access_token);
        }

        self.refresh(current).await
    }

    async fn refresh(&self, connection: CalendarConnection) -> Result<String, CalendarError> {
        let provider = self.providers.get(connection.provider)?;
        match provider.refresh_access_token(&connection.refresh_token).await {
            Ok(grant) => {
                let refresh_token = grant
                    .refresh_token
                    .as_deref()
                    .unwrap_or(&connection.refresh_token);
                self.connections
                    .update_tokens(&connection.id, &grant.access_token, refresh_token, grant.expires_at)
                    .await?;
                info!(
                    connection_id = %connection.id,
                    provider = %connection.provider,
                    "Refreshed access token, valid until {}",
                    grant.expires_at
                );
                Ok(grant.access_token)
            }
            Err(CalendarError::InvalidGrant(_)) => {
                warn!(
                    connection_id = %connection.id,
                    agent_id = %connection.agent_id,
                    provider = %connection.provider,
                    "Refresh token revoked, disabling calendar sync"
                );
                self.connections.disable_sync(&connection.id).await?;
                self.notify_reconnect(&connection).await;
                Err(CalendarError::ReconnectRequired(connection.id))
            }
            Err(e) => Err(e),
        }
    }

    async fn notify_reconnect(&self, connection: &CalendarConnection) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let payload = json!({
            "agentId": connection.agent_id,
            "provider": connection.provider,
            "connectionId": connection.id,
        });
        if let Err(e) = notifier
            .send(NotificationEvent::CalendarReconnectRequired, payload)
            .await
        {
            error!(agent_id = %connection.agent_id, "Reconnect notification failed: {}", e);
        }
    }

    fn lock_for(&self, connection_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other caller is waiting on it.
    fn release_lock(&self, connection_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(lock);
        if locks
            .get(connection_id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            locks.remove(connection_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}

fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - Duration::seconds(EXPIRY_SKEW_SECONDS) <= now
}
