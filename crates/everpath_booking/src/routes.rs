// --- File: crates/everpath_booking/src/routes.rs ---

use crate::handlers::{book_handler, cancel_handler, BookingState};
use axum::{routing::post, Router};
use std::sync::Arc;

/// Router for booking and cancelling appointments.
pub fn routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/book", post(book_handler))
        .route("/appointments/{appointment_id}/cancel", post(cancel_handler))
        .with_state(state)
}
