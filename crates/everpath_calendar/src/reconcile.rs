//! Brings the local mirror of one calendar connection in line with the provider.

use crate::error::CalendarError;
use crate::oauth::OAuthTokenManager;
use chrono::{DateTime, Utc};
use everpath_common::models::{CalendarConnection, ExternalEvent, ExternalEventStatus};
use chrono_tz::Tz;
use everpath_db::{
    AgentRepository, ExternalEventRepository, SqlAgentRepository, SqlExternalEventRepository,
};
use everpath_scheduling::timezone::{resolve_timezone, FALLBACK_TIMEZONE};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// What a reconcile pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub upserted: usize,
    /// Rows removed because the provider marked the item cancelled.
    pub cancelled: usize,
    /// Rows removed because the provider no longer returns the item.
    pub removed: usize,
    /// Provider items ignored because we deleted them ourselves.
    pub skipped_tombstoned: usize,
}

#[derive(Clone)]
pub struct ExternalEventReconciler {
    tokens: OAuthTokenManager,
    events: SqlExternalEventRepository,
    agents: SqlAgentRepository,
}

impl ExternalEventReconciler {
    pub fn new(
        tokens: OAuthTokenManager,
        events: SqlExternalEventRepository,
        agents: SqlAgentRepository,
    ) -> Self {
        Self {
            tokens,
            events,
            agents,
        }
    }

    /// Zone all-day items fall back to when the calendar names none.
    async fn agent_zone(&self, agent_id: &str) -> Result<Tz, CalendarError> {
        Ok(match self.agents.find_by_id(agent_id).await? {
            Some(agent) => resolve_timezone(agent.timezone.as_deref(), agent.province.as_deref()),
            None => {
                warn!(agent_id = %agent_id, "Connection owner not found, using {}", FALLBACK_TIMEZONE.name());
                FALLBACK_TIMEZONE
            }
        })
    }

    /// Re-reads `[from, to)` from the provider and updates the mirror rows.
    ///
    /// Ids carrying a tombstone are never written back, whatever the provider returns.
    pub async fn reconcile(
        &self,
        connection: &CalendarConnection,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ReconcileReport, CalendarError> {
        if to <= from {
            return Err(CalendarError::Validation("reconcile window is empty".to_string()));
        }
        let access_token = self.tokens.ensure_valid_access_token(connection).await?;
        let provider = self.tokens.providers().get(connection.provider)?;
        let zone = self.agent_zone(&connection.agent_id).await?;
        let remote = provider
            .list_events(&access_token, &connection.calendar_id, from, to, zone)
            .await?;

        let specialist_id = connection.agent_id.as_str();
        let tombstoned = self
            .events
            .tombstoned_ids(specialist_id, connection.provider)
            .await?;
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();

        for item in remote {
            seen.insert(item.id.clone());
            if tombstoned.contains(&item.id) {
                report.skipped_tombstoned += 1;
                continue;
            }
            if item.status == ExternalEventStatus::Cancelled {
                if self
                    .events
                    .delete_row(specialist_id, connection.provider, &item.id)
                    .await?
                {
                    report.cancelled += 1;
                }
                continue;
            }

            let mirror = ExternalEvent {
                specialist_id: specialist_id.to_string(),
                provider: connection.provider,
                is_platform_created: item.appointment_id.is_some(),
                appointment_id: item.appointment_id,
                provider_event_id: item.id,
                starts_at: item.starts_at,
                ends_at: item.ends_at,
                status: item.status,
            };
            if self.events.upsert(&mirror).await? {
                report.upserted += 1;
            } else {
                report.skipped_tombstoned += 1;
            }
        }

        let local = self
            .events
            .find_in_window(specialist_id, connection.provider, from, to)
            .await?;
        for row in local.iter().filter(|row| !seen.contains(&row.provider_event_id)) {
            debug!("Provider no longer lists {}, dropping mirror row", row.provider_event_id);
            if self
                .events
                .delete_row(specialist_id, connection.provider, &row.provider_event_id)
                .await?
            {
                report.removed += 1;
            }
        }

        info!(
            agent_id = %connection.agent_id,
            provider = %connection.provider,
            "Reconciled calendar: {} upserted, {} cancelled, {} removed, {} tombstoned",
            report.upserted,
            report.cancelled,
            report.removed,
            report.skipped_tombstoned
        );
        Ok(report)
    }
}
