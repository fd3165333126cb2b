//! Fakes and fixtures for the coordinator and route tests.

use crate::coordinator::{BookingRequest, BookingTransactionCoordinator};
use chrono::{Duration, Utc};
use everpath_calendar::google::GoogleCalendarProvider;
use everpath_calendar::{CalendarSyncAdapter, OAuthTokenManager, ProviderRegistry};
use everpath_common::models::{
    Agent, AgentRole, ApprovalStatus, CalendarConnection, Provider,
};
use everpath_common::services::{
    BoxFuture, ChargeOutcome, NotificationEvent, NotificationService, PaymentService,
};
use everpath_common::EverpathError;
use everpath_config::{BookingConfig, GoogleConfig};
use everpath_db::{AgentRepository, CalendarConnectionRepository, DbClient, Repositories};
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

pub const AGENT_ID: &str = "agent-vancouver";
/// Monday 2030-05-06, 09:00 in Vancouver.
pub const MONDAY_NINE: &str = "2030-05-06T16:00:00Z";

pub fn bc_agent() -> Agent {
    Agent {
        id: AGENT_ID.into(),
        role: AgentRole::Agent,
        approval_status: ApprovalStatus::Approved,
        display_name: "Morgan Chen".into(),
        email: "morgan@example.com".into(),
        timezone: None,
        province: Some("BC".into()),
        appointment_length_minutes: 30,
        paused: false,
        payment_customer_ref: Some("cus_test".into()),
    }
}

pub async fn repos() -> Repositories {
    let repos = Repositories::new(DbClient::in_memory().await.expect("in-memory db"));
    repos.agents.upsert(&bc_agent()).await.expect("agent stored");
    repos
}

pub fn request(starts_at: &str, email: &str) -> BookingRequest {
    BookingRequest {
        agent_id: AGENT_ID.into(),
        starts_at: starts_at.into(),
        first_name: "Jamie".into(),
        last_name: "Rivera".into(),
        email: email.into(),
        phone: Some("+1 604 555 0142".into()),
        city: Some("Vancouver".into()),
        service_type: Some("pre-planning".into()),
        location: Some("kitsilano".into()),
        ..Default::default()
    }
}

/// Answers every charge with a fixed result and records the calls.
pub struct FakePayments {
    outcome: Result<ChargeOutcome, String>,
    pub calls: Mutex<Vec<(String, i64, String)>>,
}

impl FakePayments {
    pub fn succeeding(charge_id: &str) -> Arc<Self> {
        Self::answering(Ok(ChargeOutcome::Success {
            charge_id: charge_id.into(),
        }))
    }

    pub fn declining(reason: &str) -> Arc<Self> {
        Self::answering(Ok(ChargeOutcome::Declined {
            reason: reason.into(),
        }))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::answering(Err(message.into()))
    }

    fn answering(outcome: Result<ChargeOutcome, String>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, i64, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PaymentService for FakePayments {
    fn charge(
        &self,
        customer_ref: &str,
        amount_minor_units: i64,
        idempotency_key: &str,
    ) -> BoxFuture<'_, ChargeOutcome, EverpathError> {
        self.calls.lock().unwrap().push((
            customer_ref.to_string(),
            amount_minor_units,
            idempotency_key.to_string(),
        ));
        let outcome = self
            .outcome
            .clone()
            .map_err(EverpathError::TimeoutError);
        Box::pin(async move { outcome })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationEvent, Value)>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.sent.lock().unwrap().iter().map(|(event, _)| *event).collect()
    }

    pub fn payload(&self, event: NotificationEvent) -> Option<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .find(|(sent, _)| *sent == event)
            .map(|(_, payload)| payload.clone())
    }
}

impl NotificationService for RecordingNotifier {
    fn send(&self, event: NotificationEvent, payload: Value) -> BoxFuture<'_, (), EverpathError> {
        self.sent.lock().unwrap().push((event, payload));
        Box::pin(async { Ok(()) })
    }
}

pub fn coordinator(
    repos: &Repositories,
    payments: Option<Arc<FakePayments>>,
    notifier: Arc<RecordingNotifier>,
) -> BookingTransactionCoordinator {
    let coordinator = BookingTransactionCoordinator::new(BookingConfig::default(), repos, notifier);
    match payments {
        Some(payments) => coordinator.with_payments(payments),
        None => coordinator,
    }
}

/// Calendar sync against a Google mock, with a stored connection holding a fresh token.
pub async fn google_sync(repos: &Repositories, server: &MockServer) -> CalendarSyncAdapter {
    let google = GoogleCalendarProvider::new(
        Client::new(),
        GoogleConfig {
            client_id: "google-client".into(),
            client_secret: "google-secret".into(),
            api_base_url: server.uri(),
            token_url: format!("{}/token", server.uri()),
        },
    );
    repos
        .connections
        .upsert(&CalendarConnection {
            id: "conn-google".into(),
            agent_id: AGENT_ID.into(),
            provider: Provider::Google,
            access_token: "access-1".into(),
            refresh_token: "refresh-1".into(),
            token_expires_at: Utc::now() + Duration::hours(1),
            calendar_id: "primary".into(),
            sync_enabled: true,
            channel_id: None,
            channel_resource_id: None,
            channel_expires_at: None,
        })
        .await
        .expect("connection stored");

    let tokens = OAuthTokenManager::new(
        repos.connections.clone(),
        ProviderRegistry::new().with(Arc::new(google)),
    );
    CalendarSyncAdapter::new(tokens, repos.connections.clone(), repos.external_events.clone())
}
