//! Microsoft Graph calendar client.

use crate::error::CalendarError;
use crate::provider::{
    check_status, request_token, CalendarProvider, ChannelRequest, NewProviderEvent, ProviderEvent,
    TokenGrant, WebhookChannel, APPOINTMENT_ID_PROPERTY,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use everpath_common::models::{ExternalEventStatus, Provider};
use everpath_config::MicrosoftConfig;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

const OUTLOOK_UTC_HEADER: &str = r#"outlook.timezone="UTC""#;
const PAGE_SIZE: &str = "100";
const GRAPH_LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Namespace of our single-value extended property.
const PROPERTY_SET: &str = "{5b0c8a8e-3f7d-4c51-9a2e-7e4d1f6b9c20}";

fn property_id() -> String {
    format!("String {PROPERTY_SET} Name {APPOINTMENT_ID_PROPERTY}")
}

#[derive(Clone)]
pub struct MicrosoftCalendarProvider {
    client: Client,
    config: MicrosoftConfig,
}

impl MicrosoftCalendarProvider {
    pub fn new(client: Client, config: MicrosoftConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| CalendarError::Validation(format!("invalid Graph base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Validation("Graph base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `primary` maps to the mailbox default calendar.
    fn calendar_segments<'a>(calendar_id: &'a str, leaf: &'a str) -> Vec<&'a str> {
        if calendar_id.eq_ignore_ascii_case("primary") {
            vec!["me", leaf]
        } else {
            vec!["me", "calendars", calendar_id, leaf]
        }
    }

    fn token_form<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        form.extend_from_slice(extra);
        form
    }
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

#[derive(Deserialize)]
struct EventPage {
    #[serde(default)]
    value: Vec<GraphEvent>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    id: String,
    #[serde(default)]
    is_cancelled: bool,
    show_as: Option<String>,
    start: GraphDateTime,
    end: GraphDateTime,
    #[serde(default)]
    single_value_extended_properties: Vec<ExtendedProperty>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
    time_zone: Option<String>,
}

#[derive(Deserialize)]
struct ExtendedProperty {
    id: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    id: String,
    expiration_date_time: Option<DateTime<Utc>>,
}

impl GraphDateTime {
    fn to_utc(&self) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        let tz: Tz = self.time_zone.as_deref().unwrap_or("UTC").parse().ok()?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

fn event_status(event: &GraphEvent) -> ExternalEventStatus {
    if event.is_cancelled {
        return ExternalEventStatus::Cancelled;
    }
    match event.show_as.as_deref() {
        Some("free") | Some("tentative") => ExternalEventStatus::Tentative,
        _ => ExternalEventStatus::Confirmed,
    }
}

fn to_provider_event(event: GraphEvent, property_id: &str) -> Option<ProviderEvent> {
    let (Some(starts_at), Some(ends_at)) = (event.start.to_utc(), event.end.to_utc()) else {
        warn!(event_id = %event.id, "Skipping Graph event with unreadable times");
        return None;
    };
    let status = event_status(&event);
    let appointment_id = event
        .single_value_extended_properties
        .into_iter()
        .find(|p| p.id.eq_ignore_ascii_case(property_id))
        .map(|p| p.value);

    Some(ProviderEvent {
        id: event.id,
        starts_at,
        ends_at,
        status,
        appointment_id,
    })
}

fn graph_local(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(GRAPH_LOCAL_FORMAT).to_string()
}

#[async_trait]
impl CalendarProvider for MicrosoftCalendarProvider {
    fn kind(&self) -> Provider {
        Provider::Microsoft
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenGrant, CalendarError> {
        let form = self.token_form(&[
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ]);
        request_token(&self.client, Provider::Microsoft, &self.config.token_url, &form).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant, CalendarError> {
        let form = self.token_form(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);
        request_token(&self.client, Provider::Microsoft, &self.config.token_url, &form).await
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewProviderEvent,
    ) -> Result<String, CalendarError> {
        let url = self.endpoint(&Self::calendar_segments(calendar_id, "events"))?;
        let zone = event.timezone.name();
        let body = json!({
            "subject": event.summary,
            "body": { "contentType": "text", "content": event.description },
            "start": { "dateTime": graph_local(event.starts_at, event.timezone), "timeZone": zone },
            "end": { "dateTime": graph_local(event.ends_at, event.timezone), "timeZone": zone },
            "singleValueExtendedProperties": [
                { "id": property_id(), "value": event.appointment_id }
            ]
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let created: CreatedEvent = check_status(Provider::Microsoft, response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::decode(Provider::Microsoft, format!("create response: {e}")))?;

        debug!(appointment_id = %event.appointment_id, "Created Graph event {}", created.id);
        Ok(created.id)
    }

    async fn delete_event(
        &self,
        access_token: &str,
        _calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarError> {
        let url = self.endpoint(&["me", "events", event_id])?;
        let response = self.client.delete(url).bearer_auth(access_token).send().await?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!("Graph event {} already gone", event_id);
            return Ok(());
        }
        check_status(Provider::Microsoft, response).await?;
        Ok(())
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        _zone: Tz,
    ) -> Result<Vec<ProviderEvent>, CalendarError> {
        let property_id = property_id();
        let mut url = self.endpoint(&Self::calendar_segments(calendar_id, "calendarView"))?;
        url.query_pairs_mut()
            .append_pair("startDateTime", &from.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("endDateTime", &to.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("$top", PAGE_SIZE)
            .append_pair("$select", "id,start,end,isCancelled,showAs")
            .append_pair(
                "$expand",
                &format!("singleValueExtendedProperties($filter=id eq '{property_id}')"),
            );

        let mut events = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next.take() {
            let response = self
                .client
                .get(page_url)
                .bearer_auth(access_token)
                .header("Prefer", OUTLOOK_UTC_HEADER)
                .send()
                .await?;
            let page: EventPage = check_status(Provider::Microsoft, response)
                .await?
                .json()
                .await
                .map_err(|e| CalendarError::decode(Provider::Microsoft, format!("calendarView page: {e}")))?;

            events.extend(
                page.value
                    .into_iter()
                    .filter_map(|e| to_provider_event(e, &property_id)),
            );
            next = page
                .next_link
                .map(|link| {
                    Url::parse(&link).map_err(|e| CalendarError::decode(Provider::Microsoft, e))
                })
                .transpose()?;
        }

        debug!("Listed {} Graph events in {}", events.len(), calendar_id);
        Ok(events)
    }

    async fn subscribe(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError> {
        let url = self.endpoint(&["subscriptions"])?;
        let resource = Self::calendar_segments(calendar_id, "events").join("/");
        let body = json!({
            "changeType": "created,updated,deleted",
            "notificationUrl": request.callback_url,
            "resource": resource,
            "expirationDateTime": request.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "clientState": request.token,
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let subscription: Subscription = check_status(Provider::Microsoft, response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::decode(Provider::Microsoft, format!("subscription: {e}")))?;

        let expires_at = subscription.expiration_date_time.unwrap_or(request.expires_at);
        info!(subscription_id = %subscription.id, "Graph subscription open until {}", expires_at);
        Ok(WebhookChannel {
            channel_id: request.channel_id.clone(),
            resource_id: subscription.id,
            expires_at,
        })
    }

    /// Graph subscriptions are extended in place.
    async fn renew(
        &self,
        access_token: &str,
        _calendar_id: &str,
        current: &WebhookChannel,
        request: &ChannelRequest,
    ) -> Result<WebhookChannel, CalendarError> {
        let url = self.endpoint(&["subscriptions", &current.resource_id])?;
        let response = self
            .client
            .patch(url)
            .bearer_auth(access_token)
            .json(&json!({
                "expirationDateTime": request.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            }))
            .send()
            .await?;
        let subscription: Subscription = check_status(Provider::Microsoft, response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::decode(Provider::Microsoft, format!("subscription: {e}")))?;

        Ok(WebhookChannel {
            channel_id: current.channel_id.clone(),
            resource_id: subscription.id,
            expires_at: subscription.expiration_date_time.unwrap_or(request.expires_at),
        })
    }

    async fn stop(&self, access_token: &str, channel: &WebhookChannel) -> Result<(), CalendarError> {
        let url = self.endpoint(&["subscriptions", &channel.resource_id])?;
        let response = self.client.delete(url).bearer_auth(access_token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(Provider::Microsoft, response).await?;
        Ok(())
    }
}
