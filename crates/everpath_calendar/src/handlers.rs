// File: crates/everpath_calendar/src/handlers.rs
use crate::error::CalendarError;
use crate::oauth::OAuthTokenManager;
use crate::provider::ProviderRegistry;
use crate::reconcile::ExternalEventReconciler;
use crate::sync::CalendarSyncAdapter;
use crate::webhook::WebhookSubscriptionManager;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration, Utc};
use everpath_common::models::{CalendarConnection, Provider};
use everpath_common::services::NotificationService;
use everpath_common::EverpathError;
use everpath_config::AppConfig;
use everpath_db::{
    AgentRepository, CalendarConnectionRepository, Repositories, SqlAgentRepository,
    SqlCalendarConnectionRepository,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

const DEFAULT_RESYNC_WINDOW_DAYS: i64 = 60;

/// Everything the calendar routes need, built once at startup.
#[derive(Clone)]
pub struct CalendarState {
    pub config: Arc<AppConfig>,
    pub agents: SqlAgentRepository,
    pub connections: SqlCalendarConnectionRepository,
    pub tokens: OAuthTokenManager,
    pub sync: CalendarSyncAdapter,
    pub reconciler: ExternalEventReconciler,
    /// `None` when no `[webhooks]` section is configured.
    pub webhooks: Option<WebhookSubscriptionManager>,
}

impl CalendarState {
    pub fn new(
        config: Arc<AppConfig>,
        repos: &Repositories,
        providers: ProviderRegistry,
        notifier: Option<Arc<dyn NotificationService>>,
    ) -> Self {
        let mut tokens = OAuthTokenManager::new(repos.connections.clone(), providers);
        if let Some(notifier) = notifier {
            tokens = tokens.with_notifier(notifier);
        }
        let webhooks = config.webhooks.clone().map(|webhook_config| {
            WebhookSubscriptionManager::new(tokens.clone(), repos.connections.clone(), webhook_config)
        });

        Self {
            agents: repos.agents.clone(),
            connections: repos.connections.clone(),
            sync: CalendarSyncAdapter::new(
                tokens.clone(),
                repos.connections.clone(),
                repos.external_events.clone(),
            ),
            reconciler: ExternalEventReconciler::new(
                tokens.clone(),
                repos.external_events.clone(),
                repos.agents.clone(),
            ),
            tokens,
            webhooks,
            config,
        }
    }

    /// Window re-read after a push notification: a day back, `resync_window_days` ahead.
    pub fn resync_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let ahead = self
            .config
            .webhooks
            .as_ref()
            .map(|w| w.resync_window_days)
            .unwrap_or(DEFAULT_RESYNC_WINDOW_DAYS);
        (now - Duration::days(1), now + Duration::days(ahead.max(1)))
    }

    fn webhooks(&self) -> Result<&WebhookSubscriptionManager, CalendarError> {
        self.webhooks
            .as_ref()
            .ok_or_else(|| CalendarError::NotFound("calendar webhooks are not configured".to_string()))
    }

    /// Runs a reconcile for `connection` in the background.
    pub fn spawn_reconcile(&self, connection: CalendarConnection) -> JoinHandle<()> {
        let reconciler = self.reconciler.clone();
        let (from, to) = self.resync_window(Utc::now());
        tokio::spawn(async move {
            if let Err(e) = reconciler.reconcile(&connection, from, to).await {
                error!(
                    agent_id = %connection.agent_id,
                    provider = %connection.provider,
                    "Calendar re-sync failed: {}",
                    e
                );
            }
        })
    }
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub agent_id: String,
    /// Authorization code from the provider consent redirect
    pub code: String,
    pub redirect_uri: String,
    /// Defaults to the primary calendar
    pub calendar_id: Option<String>,
}

#[derive(Deserialize, Debug)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct GraphValidationQuery {
    pub validation_token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GraphNotificationBatch {
    #[serde(default)]
    value: Vec<GraphNotification>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GraphNotification {
    subscription_id: Option<String>,
    client_state: Option<String>,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Exchanges an OAuth code, stores the connection and subscribes to its changes.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/calendar/{provider}/connect",
    params(("provider" = String, Path, description = "google or microsoft")),
    request_body = ConnectRequest,
    responses(
        (status = 201, description = "Calendar connected", body = CalendarConnection),
        (status = 400, description = "Unknown provider or unusable grant"),
        (status = 404, description = "Unknown agent or provider disabled"),
        (status = 502, description = "Provider token endpoint failed")
    ),
    tag = "Calendar"
))]
pub async fn connect_handler(
    State(state): State<Arc<CalendarState>>,
    Path(provider): Path<String>,
    Json(payload): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<CalendarConnection>), EverpathError> {
    let provider: Provider = provider.parse().map_err(EverpathError::ValidationError)?;
    state
        .agents
        .find_by_id(&payload.agent_id)
        .await
        .map_err(CalendarError::from)?
        .ok_or_else(|| CalendarError::NotFound(format!("agent {}", payload.agent_id)))?;

    let client = state.tokens.providers().get(provider)?;
    let grant = client
        .exchange_code(&payload.code, &payload.redirect_uri)
        .await?;
    let refresh_token = grant.refresh_token.ok_or_else(|| {
        CalendarError::Validation(format!(
            "{provider} returned no refresh token; consent must grant offline access"
        ))
    })?;

    let connection = CalendarConnection {
        id: Uuid::new_v4().to_string(),
        agent_id: payload.agent_id,
        provider,
        access_token: grant.access_token,
        refresh_token,
        token_expires_at: grant.expires_at,
        calendar_id: payload.calendar_id.unwrap_or_else(|| "primary".to_string()),
        sync_enabled: true,
        channel_id: None,
        channel_resource_id: None,
        channel_expires_at: None,
    };
    let mut stored = state
        .connections
        .upsert(&connection)
        .await
        .map_err(CalendarError::from)?;
    info!(agent_id = %stored.agent_id, %provider, "Calendar connected");

    if let Some(webhooks) = &state.webhooks {
        match webhooks.subscribe(&stored).await {
            Ok(channel) => {
                stored.channel_id = Some(channel.channel_id);
                stored.channel_resource_id = Some(channel.resource_id);
                stored.channel_expires_at = Some(channel.expires_at);
            }
            Err(e) => warn!(agent_id = %stored.agent_id, %provider, "Webhook subscription failed: {}", e),
        }
    }
    state.spawn_reconcile(stored.clone());

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Receives Google push notifications.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/webhooks/google",
    params(
        ("X-Goog-Channel-ID" = String, Header, description = "Channel id"),
        ("X-Goog-Channel-Token" = String, Header, description = "Channel verification token"),
        ("X-Goog-Resource-State" = String, Header, description = "sync, exists or not_exists")
    ),
    responses(
        (status = 200, description = "Handshake acknowledged"),
        (status = 202, description = "Re-sync scheduled"),
        (status = 401, description = "Token does not match the channel"),
        (status = 404, description = "Unknown channel")
    ),
    tag = "Calendar"
))]
pub async fn google_webhook_handler(
    State(state): State<Arc<CalendarState>>,
    headers: HeaderMap,
) -> Result<StatusCode, EverpathError> {
    let channel_id = header_value(&headers, "x-goog-channel-id")
        .ok_or_else(|| EverpathError::ValidationError("missing X-Goog-Channel-ID".to_string()))?;
    let token = header_value(&headers, "x-goog-channel-token")
        .ok_or_else(|| EverpathError::AuthError("missing X-Goog-Channel-Token".to_string()))?;
    let resource_state = header_value(&headers, "x-goog-resource-state").unwrap_or("exists");

    let connection = state.webhooks()?.authenticate_google(channel_id, token).await?;
    if resource_state == "sync" {
        debug!(channel_id, "Google channel handshake");
        return Ok(StatusCode::OK);
    }

    info!(agent_id = %connection.agent_id, resource_state, "Google calendar changed");
    state.spawn_reconcile(connection);
    Ok(StatusCode::ACCEPTED)
}

/// Receives Microsoft Graph notifications and answers subscription validation.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/webhooks/microsoft",
    params(GraphValidationQuery),
    responses(
        (status = 200, description = "Validation token echoed as text/plain"),
        (status = 202, description = "Re-sync scheduled"),
        (status = 401, description = "No notification carried a valid clientState")
    ),
    tag = "Calendar"
))]
pub async fn microsoft_webhook_handler(
    State(state): State<Arc<CalendarState>>,
    Query(query): Query<GraphValidationQuery>,
    body: Bytes,
) -> Result<Response, EverpathError> {
    if let Some(token) = query.validation_token {
        debug!("Answering Graph subscription validation");
        return Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], token).into_response());
    }

    let batch: GraphNotificationBatch = serde_json::from_slice(&body)?;
    let webhooks = state.webhooks()?;
    let mut affected: HashMap<String, CalendarConnection> = HashMap::new();
    for notification in &batch.value {
        let Some(client_state) = notification.client_state.as_deref() else {
            warn!(subscription_id = ?notification.subscription_id, "Graph notification without clientState");
            continue;
        };
        match webhooks.authenticate_microsoft(client_state).await {
            Ok(connection) => {
                affected.entry(connection.id.clone()).or_insert(connection);
            }
            Err(e) => warn!(subscription_id = ?notification.subscription_id, "Ignoring Graph notification: {}", e),
        }
    }

    if affected.is_empty() && !batch.value.is_empty() {
        return Err(EverpathError::AuthError("no valid Graph notification".to_string()));
    }
    for connection in affected.into_values() {
        info!(agent_id = %connection.agent_id, "Microsoft calendar changed");
        state.spawn_reconcile(connection);
    }
    Ok(StatusCode::ACCEPTED.into_response())
}
