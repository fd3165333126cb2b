//! Google Calendar v3 over plain REST.

use crate::error::CalendarError;
use crate::provider::{
    check_status, request_token, CalendarProvider, ChannelRequest, NewProviderEvent, ProviderEvent,
    TokenGrant, WebhookChannel, APPOINTMENT_ID_PROPERTY,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use everpath_common::models::{ExternalEventStatus, Provider};
use everpath_config::GoogleConfig;
use everpath_scheduling::slots::resolve_local;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

const PAGE_SIZE: &str = "250";

#[derive(Clone)]
pub struct GoogleCalendarProvider {
    client: Client,
    config: GoogleConfig,
}

impl GoogleCalendarProvider {
    pub fn new(client: Client, config: GoogleConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| CalendarError::Validation(format!("invalid Google API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Validation("Google API base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn watch(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", "watch"])?;
        let body = json!({
            "id": request.channel_id,
            "type": "web_hook",
            "address": request.callback_url,
            "token": request.token,
            "expiration": request.expires_at.timestamp_millis(),
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let channel: GoogleChannel = check_status(Provider::Google, response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::decode(Provider::Google, format!("watch response: {e}")))?;

        let expires_at = channel
            .expiration
            .as_ref()
            .and_then(parse_expiration)
            .unwrap_or(request.expires_at);
        info!(channel_id = %channel.id, "Google channel open until {}", expires_at);
        Ok(WebhookChannel {
            channel_id: channel.id,
            resource_id: channel.resource_id,
            expires_at,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleChannel {
    id: String,
    resource_id: String,
    /// Unix millis, sent as a string.
    expiration: Option<Value>,
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
    /// The calendar's own zone; all-day dates are days in this zone.
    time_zone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    status: Option<String>,
    transparency: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
    extended_properties: Option<ExtendedProperties>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<FixedOffset>>,
    /// All-day events carry a date only.
    date: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct ExtendedProperties {
    #[serde(default)]
    private: HashMap<String, String>,
}

fn parse_expiration(raw: &Value) -> Option<DateTime<Utc>> {
    let millis = match raw {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

impl EventTime {
    /// Date-only values start at local midnight in `zone`.
    fn to_utc(&self, zone: Tz) -> Option<DateTime<Utc>> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(dt.with_timezone(&Utc)),
            (None, Some(date)) => resolve_local(zone, date, NaiveTime::MIN),
            (None, None) => None,
        }
    }
}

fn calendar_zone(reported: Option<&str>, fallback: Tz) -> Tz {
    match reported.map(str::parse::<Tz>) {
        Some(Ok(tz)) => tz,
        Some(Err(_)) => {
            warn!("Unknown Google calendar zone {:?}, using {}", reported, fallback.name());
            fallback
        }
        None => fallback,
    }
}

fn event_status(event: &GoogleEvent) -> ExternalEventStatus {
    match event.status.as_deref() {
        Some("cancelled") => ExternalEventStatus::Cancelled,
        Some("tentative") => ExternalEventStatus::Tentative,
        _ if event.transparency.as_deref() == Some("transparent") => ExternalEventStatus::Tentative,
        _ => ExternalEventStatus::Confirmed,
    }
}

/// Cancelled items may arrive without times; they are stamped with `fallback`.
fn to_provider_event(event: GoogleEvent, zone: Tz, fallback: DateTime<Utc>) -> Option<ProviderEvent> {
    let status = event_status(&event);
    let starts_at = event.start.as_ref().and_then(|t| t.to_utc(zone));
    let ends_at = event.end.as_ref().and_then(|t| t.to_utc(zone));
    let (starts_at, ends_at) = match (starts_at, ends_at, status) {
        (Some(s), Some(e), _) => (s, e),
        (_, _, ExternalEventStatus::Cancelled) => (fallback, fallback),
        _ => {
            warn!(event_id = %event.id, "Skipping Google event without start/end");
            return None;
        }
    };
    let appointment_id = event
        .extended_properties
        .and_then(|mut p| p.private.remove(APPOINTMENT_ID_PROPERTY));

    Some(ProviderEvent {
        id: event.id,
        starts_at,
        ends_at,
        status,
        appointment_id,
    })
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> Provider {
        Provider::Google
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, CalendarError> {
        request_token(
            &self.client,
            Provider::Google,
            &self.config.token_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ],
        )
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError> {
        request_token(
            &self.client,
            Provider::Google,
            &self.config.token_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )
        .await
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewProviderEvent,
    ) -> Result<String, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let zone = event.timezone.name();
        let body = json!({
            "summary": event.summary,
            "description": event.description,
            "start": {
                "dateTime": event.starts_at.with_timezone(&event.timezone).to_rfc3339(),
                "timeZone": zone,
            },
            "end": {
                "dateTime": event.ends_at.with_timezone(&event.timezone).to_rfc3339(),
                "timeZone": zone,
            },
            "extendedProperties": {
                "private": { APPOINTMENT_ID_PROPERTY: event.appointment_id }
            }
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .query(&[("sendUpdates", "none")])
            .json(&body)
            .send()
            .await?;
        let created: CreatedEvent = check_status(Provider::Google, response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::decode(Provider::Google, format!("insert response: {e}")))?;

        debug!(appointment_id = %event.appointment_id, "Created Google event {}", created.id);
        Ok(created.id)
    }

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(access_token)
            .query(&[("sendUpdates", "none")])
            .send()
            .await?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!("Google event {} already gone", event_id);
            return Ok(());
        }
        check_status(Provider::Google, response).await?;
        Ok(())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        zone: Tz,
    ) -> Result<Vec<ProviderEvent>, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let (time_min, time_max) = (rfc3339(from), rfc3339(to));
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("showDeleted", "true"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await?;
            let page: EventList = check_status(Provider::Google, response)
                .await?
                .json()
                .await
                .map_err(|e| CalendarError::decode(Provider::Google, format!("events page: {e}")))?;

            let page_zone = calendar_zone(page.time_zone.as_deref(), zone);
            events.extend(
                page.items
                    .into_iter()
                    .filter_map(|e| to_provider_event(e, page_zone, from)),
            );
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("Listed {} Google events in {}", events.len(), calendar_id);
        Ok(events)
    }

    async fn subscribe(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError> {
        self.watch(access_token, calendar_id, request).await
    }

    /// Google channels cannot be extended: open a new one, then close the old.
    async fn renew(
        &self,
        access_token: &str,
        calendar_id: &str,
        current: &WebhookChannel,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError> {
        let channel = self.watch(access_token, calendar_id, request).await?;
        if let Err(e) = self.stop(access_token, current).await {
            warn!(channel_id = %current.channel_id, "Failed to stop replaced Google channel: {}", e);
        }
        Ok(channel)
    }

    async fn stop(&self, access_token: &str, channel: &WebhookChannel) -> Result<(), CalendarError> {
        let url = self.endpoint(&["channels", "stop"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&json!({ "id": channel.channel_id, "resourceId": channel.resource_id }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(Provider::Google, response).await?;
        Ok(())
    }
}
