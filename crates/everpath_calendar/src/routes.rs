// --- File: crates/everpath_calendar/src/routes.rs ---

use crate::handlers::{connect_handler, google_webhook_handler, microsoft_webhook_handler, CalendarState};
use axum::{routing::post, Router};
use std::sync::Arc;

/// Calendar connect flow and provider push receivers.
pub fn routes(state: Arc<CalendarState>) -> Router {
    Router::new()
        .route("/calendar/{provider}/connect", post(connect_handler))
        .route("/webhooks/google", post(google_webhook_handler))
        .route("/webhooks/microsoft", post(microsoft_webhook_handler))
        .with_state(state)
}
