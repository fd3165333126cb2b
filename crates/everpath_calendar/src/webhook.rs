//! Push-notification channels: opening, renewing and authenticating them.
//!
//! Every channel carries a token derived from the channel id with HMAC-SHA256 under the
//! webhook signing secret. Google echoes it in `X-Goog-Channel-Token`; Microsoft echoes it as
//! `clientState`, prefixed with the channel id so the connection can be found again.

use crate::error::CalendarError;
use crate::oauth::OAuthTokenManager;
use crate::provider::{ChannelRequest, WebhookChannel};
use chrono::{DateTime, Duration, Utc};
use everpath_common::models::{CalendarConnection, Provider};
use everpath_config::WebhookConfig;
use everpath_db::{CalendarConnectionRepository, ChannelRecord, SqlCalendarConnectionRepository};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, info};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Google allows up to 7 days for an events watch channel.
pub const GOOGLE_CHANNEL_TTL_DAYS: i64 = 7;
/// Upper bound for Graph subscriptions on Outlook resources (just under 3 days).
pub const MICROSOFT_SUBSCRIPTION_MINUTES: i64 = 4230;

pub fn channel_ttl(provider: Provider) -> Duration {
    match provider {
        Provider::Google => Duration::days(GOOGLE_CHANNEL_TTL_DAYS),
        Provider::Microsoft => Duration::minutes(MICROSOFT_SUBSCRIPTION_MINUTES),
    }
}

/// Hex HMAC-SHA256 of `channel_id` under `secret`.
pub fn channel_token(secret: &str, channel_id: &str) -> String {
    keyed(secret)
        .map(|mut mac| {
            mac.update(channel_id.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        })
        .unwrap_or_default()
}

/// Constant-time check of a token presented by a provider.
pub fn verify_channel_token(secret: &str, channel_id: &str, token: &str) -> bool {
    let Ok(presented) = hex::decode(token) else {
        return false;
    };
    keyed(secret).is_some_and(|mut mac| {
        mac.update(channel_id.as_bytes());
        mac.verify_slice(&presented).is_ok()
    })
}

fn keyed(secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

/// `clientState` value for a Graph subscription: `<channel id>.<token>`.
pub fn client_state(secret: &str, channel_id: &str) -> String {
    format!("{channel_id}.{}", channel_token(secret, channel_id))
}

/// Splits and verifies a Graph `clientState`, returning the channel id it names.
pub fn verify_client_state<'a>(secret: &str, state: &'a str) -> Option<&'a str> {
    let (channel_id, token) = state.split_once('.')?;
    verify_channel_token(secret, channel_id, token).then_some(channel_id)
}

/// Outcome of a renewal sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenewalSummary {
    pub renewed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct WebhookSubscriptionManager {
    tokens: OAuthTokenManager,
    connections: SqlCalendarConnectionRepository,
    config: WebhookConfig,
}

impl WebhookSubscriptionManager {
    pub fn new(
        tokens: OAuthTokenManager,
        connections: SqlCalendarConnectionRepository,
        config: WebhookConfig,
    ) -> Self {
        Self {
            tokens,
            connections,
            config,
        }
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    pub fn callback_url(&self, provider: Provider) -> String {
        format!(
            "{}/webhooks/{}",
            self.config.public_base_url.trim_end_matches('/'),
            provider
        )
    }

    fn request_for(&self, provider: Provider, channel_id: String, now: DateTime<Utc>) -> ChannelRequest {
        let token = match provider {
            Provider::Google => channel_token(&self.config.signing_secret, &channel_id),
            Provider::Microsoft => client_state(&self.config.signing_secret, &channel_id),
        };
        ChannelRequest {
            callback_url: self.callback_url(provider),
            token,
            expires_at: now + channel_ttl(provider),
            channel_id,
        }
    }

    /// Opens a new channel for the connection and stores it.
    pub async fn subscribe(&self, connection: &CalendarConnection) -> Result<WebhookChannel, CalendarError> {
        let access_token = self.tokens.ensure_valid_access_token(connection).await?;
        let provider = self.tokens.providers().get(connection.provider)?;
        let request = self.request_for(connection.provider, Uuid::new_v4().to_string(), Utc::now());

        let channel = provider
            .subscribe(&access_token, &connection.calendar_id, &request)
            .await?;
        self.store(connection, &channel).await?;
        info!(
            agent_id = %connection.agent_id,
            provider = %connection.provider,
            "Subscribed to calendar changes until {}",
            channel.expires_at
        );
        Ok(channel)
    }

    /// Extends the connection's channel, or opens one if it has none.
    pub async fn renew(&self, connection: &CalendarConnection) -> Result<WebhookChannel, CalendarError> {
        let Some(current) = current_channel(connection) else {
            return self.subscribe(connection).await;
        };
        let access_token = self.tokens.ensure_valid_access_token(connection).await?;
        let provider = self.tokens.providers().get(connection.provider)?;
        let channel_id = match connection.provider {
            Provider::Google => Uuid::new_v4().to_string(),
            Provider::Microsoft => current.channel_id.clone(),
        };
        let request = self.request_for(connection.provider, channel_id, Utc::now());

        let channel = provider
            .renew(&access_token, &connection.calendar_id, &current, &request)
            .await?;
        self.store(connection, &channel).await?;
        info!(
            agent_id = %connection.agent_id,
            provider = %connection.provider,
            "Renewed calendar channel until {}",
            channel.expires_at
        );
        Ok(channel)
    }

    /// Renews every sync-enabled connection whose channel is missing or expires before
    /// `now + lead_time`. Failures are logged and counted, never propagated.
    pub async fn renew_due(&self, now: DateTime<Utc>, lead_time: Duration) -> Result<RenewalSummary, CalendarError> {
        let due = self
            .connections
            .find_channels_expiring_before(now + lead_time)
            .await?;
        let mut summary = RenewalSummary::default();
        for connection in &due {
            match self.renew(connection).await {
                Ok(_) => summary.renewed += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        agent_id = %connection.agent_id,
                        provider = %connection.provider,
                        "Channel renewal failed: {}",
                        e
                    );
                }
            }
        }
        if !due.is_empty() {
            info!("Channel renewal sweep: {} renewed, {} failed", summary.renewed, summary.failed);
        }
        Ok(summary)
    }

    /// Finds the connection behind a Google notification and checks its token.
    pub async fn authenticate_google(
        &self,
        channel_id: &str,
        token: &str,
    ) -> Result<CalendarConnection, CalendarError> {
        if !verify_channel_token(&self.config.signing_secret, channel_id, token) {
            return Err(CalendarError::Unauthorized(format!("bad token for channel {channel_id}")));
        }
        self.connection_for_channel(channel_id).await
    }

    /// Finds the connection behind a Graph notification from its `clientState`.
    pub async fn authenticate_microsoft(&self, client_state: &str) -> Result<CalendarConnection, CalendarError> {
        let channel_id = verify_client_state(&self.config.signing_secret, client_state)
            .ok_or_else(|| CalendarError::Unauthorized("bad clientState".to_string()))?;
        self.connection_for_channel(channel_id).await
    }

    async fn connection_for_channel(&self, channel_id: &str) -> Result<CalendarConnection, CalendarError> {
        self.connections
            .find_by_channel_id(channel_id)
            .await?
            .ok_or_else(|| CalendarError::NotFound(format!("channel {channel_id}")))
    }

    async fn store(&self, connection: &CalendarConnection, channel: &WebhookChannel) -> Result<(), CalendarError> {
        let record = ChannelRecord {
            channel_id: channel.channel_id.clone(),
            resource_id: channel.resource_id.clone(),
            expires_at: channel.expires_at,
        };
        if !self.connections.set_channel(&connection.id, Some(&record)).await? {
            return Err(CalendarError::NotFound(format!("calendar connection {}", connection.id)));
        }
        Ok(())
    }
}

fn current_channel(connection: &CalendarConnection) -> Option<WebhookChannel> {
    Some(WebhookChannel {
        channel_id: connection.channel_id.clone()?,
        resource_id: connection.channel_resource_id.clone()?,
        expires_at: connection.channel_expires_at?,
    })
}
