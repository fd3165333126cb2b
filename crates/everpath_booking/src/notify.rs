//! Notification delivery
//!
//! The booking core only names the event and hands over a JSON payload; templates live in
//! the mail relay behind `[notifications].endpoint_url`. When notifications are disabled
//! the events are written to the log instead.

use everpath_common::services::{BoxFuture, NotificationEvent, NotificationService};
use everpath_common::{provider_error, EverpathError};
use everpath_config::{AppConfig, NotificationConfig};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    event: NotificationEvent,
    payload: &'a Value,
}

/// Posts `{event, payload}` as JSON to the configured mail relay.
#[derive(Clone)]
pub struct HttpNotifier {
    client: Client,
    config: NotificationConfig,
}

impl HttpNotifier {
    pub fn new(client: Client, config: NotificationConfig) -> Self {
        Self { client, config }
    }
}

impl NotificationService for HttpNotifier {
    fn send(&self, event: NotificationEvent, payload: Value) -> BoxFuture<'_, (), EverpathError> {
        Box::pin(async move {
            let mut request = self
                .client
                .post(&self.config.endpoint_url)
                .json(&RelayMessage {
                    event,
                    payload: &payload,
                });
            if let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
                request = request.bearer_auth(api_key);
            }

            debug!("[Notify] Sending {} to relay", event);
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("[Notify] Relay rejected {}: {} {}", event, status, body);
                return Err(provider_error(
                    "notifications",
                    format!("Status: {}, Body: {}", status, body),
                ));
            }
            info!("[Notify] {} delivered", event);
            Ok(())
        })
    }
}

/// Writes events to the log; used when `use_notifications` is off.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

impl NotificationService for LoggingNotifier {
    fn send(&self, event: NotificationEvent, payload: Value) -> BoxFuture<'_, (), EverpathError> {
        Box::pin(async move {
            info!(%event, %payload, "Notification (not delivered, notifications disabled)");
            Ok(())
        })
    }
}

/// Picks the relay when `use_notifications` is on and configured, the log sink otherwise.
pub fn notifier_from_config(app_config: &AppConfig, client: Client) -> Arc<dyn NotificationService> {
    match AppConfig::enabled(app_config.use_notifications, &app_config.notifications) {
        Some(config) if !config.endpoint_url.is_empty() => {
            info!("Notifications go to {}", config.endpoint_url);
            Arc::new(HttpNotifier::new(client, config.clone()))
        }
        _ => {
            info!("Notifications disabled; events are logged only");
            Arc::new(LoggingNotifier)
        }
    }
}
