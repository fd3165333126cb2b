// --- File: crates/services/everpath_backend/src/lib.rs ---
pub mod app_state;
pub mod health;
pub mod service_factory;
pub mod sweep;

#[cfg(test)]
mod router_test;

use app_state::AppState;
use axum::{routing::get, Router};
use health::health_handler;
use tower_http::trace::TraceLayer;

/// Every feature router merged and nested under `/api`.
pub fn build_router(state: &AppState) -> Router {
    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the Everpath API!" }))
        .route("/health", get(health_handler))
        .with_state(state.db.clone())
        .merge(everpath_scheduling::routes::routes(state.scheduling.clone()))
        .merge(everpath_calendar::routes::routes(state.calendar.clone()))
        .merge(everpath_booking::routes::routes(state.booking.clone()));

    Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
}
