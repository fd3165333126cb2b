//! Provider boundary shared by the Google and Microsoft clients.
//!
//! Everything above this module talks to a [`CalendarProvider`] picked from the
//! [`ProviderRegistry`] by the connection's `provider` column, never to a concrete client.

use crate::error::CalendarError;
use crate::google::GoogleCalendarProvider;
use crate::microsoft::MicrosoftCalendarProvider;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use everpath_common::models::{ExternalEventStatus, Provider};
use everpath_config::AppConfig;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the private property carrying our appointment id on provider events.
pub const APPOINTMENT_ID_PROPERTY: &str = "everpathAppointmentId";

/// Tokens handed out by a provider token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Absent when the provider keeps the previous refresh token valid.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An appointment as it should appear in the agent's calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProviderEvent {
    pub appointment_id: String,
    pub summary: String,
    pub description: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Agent zone, sent as the event zone so the entry reads in local time.
    pub timezone: Tz,
}

/// A provider calendar item, normalised to UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: ExternalEventStatus,
    /// Set when the item was written by us for an appointment.
    pub appointment_id: Option<String>,
}

/// Push channel parameters chosen by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub channel_id: String,
    pub callback_url: String,
    /// Echoed back by the provider on every notification.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Push channel as acknowledged by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookChannel {
    pub channel_id: String,
    /// Google resource id or Microsoft subscription id.
    pub resource_id: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Trade an OAuth authorization code for tokens.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, CalendarError>;

    /// `grant_type=refresh_token`. A revoked token surfaces as [`CalendarError::InvalidGrant`].
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError>;

    /// Returns the provider's event id.
    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewProviderEvent,
    ) -> Result<String, CalendarError>;

    /// Deleting an event that is already gone succeeds.
    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError>;

    /// Every item overlapping `[from, to)`, cancelled ones included.
    ///
    /// `zone` places date-only (all-day) items when the calendar reports no zone of its own.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        zone: Tz,
    ) -> Result<Vec<ProviderEvent>, CalendarError>;

    async fn subscribe(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError>;

    /// Extend `current` until `request.expires_at`; the returned channel replaces it.
    async fn renew(
        &self,
        access_token: &str,
        calendar_id: &str,
        current: &WebhookChannel,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError>;

    async fn stop(&self, access_token: &str, channel: &WebhookChannel) -> Result<(), CalendarError>;
}

/// The configured providers, keyed by [`Provider`].
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn CalendarProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every provider whose `use_*` flag is on and whose section is present.
    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        let mut registry = Self::new();
        if let Some(google) = AppConfig::enabled(config.use_google, &config.google) {
            registry = registry.with(Arc::new(GoogleCalendarProvider::new(client.clone(), google.clone())));
        }
        if let Some(microsoft) = AppConfig::enabled(config.use_microsoft, &config.microsoft) {
            registry = registry.with(Arc::new(MicrosoftCalendarProvider::new(client, microsoft.clone())));
        }
        debug!("Calendar providers enabled: {:?}", registry.kinds());
        registry
    }

    pub fn with(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: Provider) -> Result<Arc<dyn CalendarProvider>, CalendarError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(CalendarError::NotConfigured(kind))
    }

    pub fn kinds(&self) -> Vec<Provider> {
        let mut kinds: Vec<Provider> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Posts a form to an OAuth2 token endpoint and maps the answer to a [`TokenGrant`].
pub(crate) async fn request_token(
    client: &Client,
    provider: Provider,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenGrant, CalendarError> {
    let response = client.post(token_url).form(form).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if let Ok(parsed) = serde_json::from_str::<TokenErrorResponse>(&body) {
            if parsed.error == "invalid_grant" {
                warn!(%provider, "Token endpoint answered invalid_grant");
                return Err(CalendarError::InvalidGrant(provider));
            }
            return Err(CalendarError::Api {
                provider,
                status: status.as_u16(),
                message: parsed.error_description.unwrap_or(parsed.error),
            });
        }
        return Err(CalendarError::Api {
            provider,
            status: status.as_u16(),
            message: body,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| CalendarError::decode(provider, format!("token response: {e}")))?;
    Ok(TokenGrant {
        access_token: token.access_token,
        refresh_token: token.refresh_token.filter(|t| !t.is_empty()),
        expires_at: Utc::now() + Duration::seconds(token.expires_in.max(0)),
    })
}

/// Passes successful responses through and turns the rest into [`CalendarError::Api`].
pub(crate) async fn check_status(provider: Provider, response: Response) -> Result<Response, CalendarError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    Err(CalendarError::Api {
        provider,
        status: status.as_u16(),
        message,
    })
}
