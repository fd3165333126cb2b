// --- File: crates/everpath_scheduling/src/routes.rs ---

use crate::handlers::{get_availability_handler, get_rules_handler, put_rules_handler, SchedulingState};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Router for open slots and working-hours rules.
pub fn routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/availability", get(get_availability_handler))
        .route(
            "/agents/{agent_id}/availability-rules",
            get(get_rules_handler).put(put_rules_handler),
        )
        .with_state(state)
}
