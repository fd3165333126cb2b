// --- File: crates/everpath_calendar/src/lib.rs ---
pub mod doc;
pub mod error;
pub mod google;
pub mod handlers;
pub mod microsoft;
#[cfg(test)]
mod microsoft_test;
pub mod oauth;
#[cfg(test)]
mod oauth_test;
pub mod provider;
pub mod reconcile;
pub mod routes;
pub mod sync;
#[cfg(test)]
mod sync_test;
#[cfg(test)]
mod test_support;
pub mod webhook;

pub use error::CalendarError;
pub use oauth::OAuthTokenManager;
pub use provider::{
    CalendarProvider, ChannelRequest, NewProviderEvent, ProviderEvent, ProviderRegistry,
    TokenGrant, WebhookChannel,
};
pub use reconcile::{ExternalEventReconciler, ReconcileReport};
pub use sync::{CalendarSyncAdapter, ProviderSyncResult};
pub use webhook::{RenewalSummary, WebhookSubscriptionManager};
