use axum::{extract::State, http::StatusCode, response::Json};
use everpath_db::DbClient;
use serde::Serialize;
use tracing::warn;

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Liveness plus a `SELECT 1` against the pool; 503 when the database is unreachable.
pub async fn health_handler(State(db): State<DbClient>) -> (StatusCode, Json<HealthResponse>) {
    if db.is_healthy().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "up",
            }),
        )
    } else {
        warn!("Health check: database unreachable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                database: "down",
            }),
        )
    }
}
