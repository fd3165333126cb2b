//! Writes appointments into agents' provider calendars and removes them again.

use crate::error::CalendarError;
use crate::oauth::OAuthTokenManager;
use crate::provider::NewProviderEvent;
use everpath_common::models::{CalendarConnection, ExternalEvent, ExternalEventStatus, Provider};
use everpath_db::{
    CalendarConnectionRepository, ExternalEventRepository, SqlCalendarConnectionRepository,
    SqlExternalEventRepository,
};
use tracing::{debug, info, warn};

/// Result of one provider write, kept per connection so one failure never hides another.
#[derive(Debug)]
pub struct ProviderSyncResult<T> {
    pub provider: Provider,
    pub result: Result<T, CalendarError>,
}

#[derive(Clone)]
pub struct CalendarSyncAdapter {
    tokens: OAuthTokenManager,
    connections: SqlCalendarConnectionRepository,
    events: SqlExternalEventRepository,
}

impl CalendarSyncAdapter {
    pub fn new(
        tokens: OAuthTokenManager,
        connections: SqlCalendarConnectionRepository,
        events: SqlExternalEventRepository,
    ) -> Self {
        Self {
            tokens,
            connections,
            events,
        }
    }

    /// Creates the event at the provider and mirrors it as a platform-created row.
    pub async fn create_event(
        &self,
        connection: &CalendarConnection,
        event: &NewProviderEvent,
    ) -> Result<ExternalEvent, CalendarError> {
        let access_token = self.tokens.ensure_valid_access_token(connection).await?;
        let provider = self.tokens.providers().get(connection.provider)?;
        let provider_event_id = provider
            .create_event(&access_token, &connection.calendar_id, event)
            .await?;

        let mirror = ExternalEvent {
            specialist_id: connection.agent_id.clone(),
            provider: connection.provider,
            provider_event_id,
            is_platform_created: true,
            appointment_id: Some(event.appointment_id.clone()),
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            status: ExternalEventStatus::Confirmed,
        };
        if !self.events.upsert(&mirror).await? {
            warn!(
                provider_event_id = %mirror.provider_event_id,
                "Provider reused a tombstoned event id; mirror row not written"
            );
        }
        info!(
            appointment_id = %event.appointment_id,
            agent_id = %connection.agent_id,
            provider = %connection.provider,
            "Appointment written to calendar as {}",
            mirror.provider_event_id
        );
        Ok(mirror)
    }

    /// Deletes the provider event. The mirror row is removed and tombstoned whatever the
    /// provider answered; the provider error, if any, is returned afterwards.
    pub async fn delete_event(&self, event: &ExternalEvent) -> Result<(), CalendarError> {
        let outcome = self.delete_at_provider(event).await;

        self.events
            .delete_with_tombstone(&event.specialist_id, event.provider, &event.provider_event_id)
            .await?;
        match &outcome {
            Ok(()) => debug!(
                provider = %event.provider,
                "Deleted calendar event {}",
                event.provider_event_id
            ),
            Err(e) => warn!(
                provider = %event.provider,
                agent_id = %event.specialist_id,
                "Provider delete of {} failed, local row removed anyway: {}",
                event.provider_event_id,
                e
            ),
        }
        outcome
    }

    async fn delete_at_provider(&self, event: &ExternalEvent) -> Result<(), CalendarError> {
        let connection = self
            .connections
            .find_by_agent(&event.specialist_id)
            .await?
            .into_iter()
            .find(|c| c.provider == event.provider)
            .ok_or_else(|| {
                CalendarError::NotFound(format!(
                    "{} connection for {}",
                    event.provider, event.specialist_id
                ))
            })?;
        let access_token = self.tokens.ensure_valid_access_token(&connection).await?;
        let provider = self.tokens.providers().get(connection.provider)?;
        provider
            .delete_event(&access_token, &connection.calendar_id, &event.provider_event_id)
            .await
    }

    /// Writes the appointment to every sync-enabled calendar of `agent_id`, each independently.
    pub async fn sync_appointment(
        &self,
        agent_id: &str,
        event: &NewProviderEvent,
    ) -> Result<Vec<ProviderSyncResult<ExternalEvent>>, CalendarError> {
        let connections = self.connections.find_by_agent(agent_id).await?;
        let mut results = Vec::new();
        for connection in connections.iter().filter(|c| c.sync_enabled) {
            results.push(ProviderSyncResult {
                provider: connection.provider,
                result: self.create_event(connection, event).await,
            });
        }
        Ok(results)
    }

    /// Deletes every platform-created event of an appointment.
    pub async fn remove_appointment(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<ProviderSyncResult<()>>, CalendarError> {
        let events = self.events.find_for_appointment(appointment_id).await?;
        let mut results = Vec::new();
        for event in &events {
            results.push(ProviderSyncResult {
                provider: event.provider,
                result: self.delete_event(event).await,
            });
        }
        Ok(results)
    }
}
