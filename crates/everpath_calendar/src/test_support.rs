//! Fixtures shared by the provider, sync and route tests.

use crate::provider::{NewProviderEvent, ProviderRegistry};
use crate::google::GoogleCalendarProvider;
use crate::microsoft::MicrosoftCalendarProvider;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use everpath_common::models::{
    Agent, AgentRole, ApprovalStatus, CalendarConnection, Provider,
};
use everpath_config::{GoogleConfig, MicrosoftConfig, WebhookConfig};
use everpath_db::{AgentRepository, CalendarConnectionRepository, DbClient, Repositories};
use reqwest::Client;
use std::sync::Arc;
use wiremock::MockServer;

pub const AGENT_ID: &str = "agent-vancouver";
pub const SECRET: &str = "webhook-signing-secret";

pub fn google_config(server: &MockServer) -> GoogleConfig {
    GoogleConfig {
        client_id: "google-client".into(),
        client_secret: "google-secret".into(),
        api_base_url: server.uri(),
        token_url: format!("{}/token", server.uri()),
    }
}

pub fn microsoft_config(server: &MockServer) -> MicrosoftConfig {
    MicrosoftConfig {
        client_id: "graph-client".into(),
        client_secret: "graph-secret".into(),
        api_base_url: server.uri(),
        token_url: format!("{}/oauth2/v2.0/token", server.uri()),
        scope: "offline_access Calendars.ReadWrite".into(),
    }
}

pub fn google(server: &MockServer) -> GoogleCalendarProvider {
    GoogleCalendarProvider::new(Client::new(), google_config(server))
}

pub fn microsoft(server: &MockServer) -> MicrosoftCalendarProvider {
    MicrosoftCalendarProvider::new(Client::new(), microsoft_config(server))
}

/// Both providers pointed at the same mock server.
pub fn registry(server: &MockServer) -> ProviderRegistry {
    ProviderRegistry::new()
        .with(Arc::new(google(server)))
        .with(Arc::new(microsoft(server)))
}

pub fn webhook_config() -> WebhookConfig {
    WebhookConfig {
        public_base_url: "https://book.example.com/api/".into(),
        signing_secret: SECRET.into(),
        renewal_lead_hours: 24,
        sweep_interval_minutes: 60,
        resync_window_days: 60,
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

pub async fn repos() -> Repositories {
    let repos = Repositories::new(DbClient::in_memory().await.expect("in-memory db"));
    repos
        .agents
        .upsert(&Agent {
            id: AGENT_ID.into(),
            role: AgentRole::Agent,
            approval_status: ApprovalStatus::Approved,
            display_name: "Morgan Chen".into(),
            email: "morgan@example.com".into(),
            timezone: Some("America/Vancouver".into()),
            province: Some("BC".into()),
            appointment_length_minutes: 30,
            paused: false,
            payment_customer_ref: Some("cus_test".into()),
        })
        .await
        .expect("agent stored");
    repos
}

pub fn connection(provider: Provider, token_expires_at: DateTime<Utc>) -> CalendarConnection {
    CalendarConnection {
        id: format!("conn-{provider}"),
        agent_id: AGENT_ID.into(),
        provider,
        access_token: "access-old".into(),
        refresh_token: "refresh-1".into(),
        token_expires_at,
        calendar_id: "primary".into(),
        sync_enabled: true,
        channel_id: None,
        channel_resource_id: None,
        channel_expires_at: None,
    }
}

pub async fn stored_connection(
    repos: &Repositories,
    provider: Provider,
    token_expires_at: DateTime<Utc>,
) -> CalendarConnection {
    repos
        .connections
        .upsert(&connection(provider, token_expires_at))
        .await
        .expect("connection stored")
}

/// A 30 minute appointment on Monday 2030-05-06, 09:00 Vancouver time.
pub fn appointment_event() -> NewProviderEvent {
    NewProviderEvent {
        appointment_id: "appt-1".into(),
        summary: "Everpath consultation".into(),
        description: "Pre-planning consultation with Jamie Rivera".into(),
        starts_at: Utc.with_ymd_and_hms(2030, 5, 6, 16, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2030, 5, 6, 16, 30, 0).unwrap(),
        timezone: Tz::America__Vancouver,
    }
}
