// File: crates/everpath_booking/src/handlers.rs
use crate::coordinator::{BookingRequest, BookingTransactionCoordinator};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use everpath_common::models::Appointment;
use everpath_common::EverpathError;
use everpath_config::AppConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

// Shared state for the booking routes
#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub coordinator: BookingTransactionCoordinator,
}

#[derive(Serialize, Debug)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AppointmentResponse {
    pub appointment: Appointment,
}

/// Books a slot; payment, calendar sync and e-mails continue after the response.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/book",
    request_body = BookingRequest,
    responses(
        (status = 201, description = "Appointment confirmed", body = AppointmentResponse),
        (status = 400, description = "Invalid timestamps or contact details"),
        (status = 403, description = "Agent is not approved"),
        (status = 404, description = "Unknown agent or rescheduled appointment"),
        (status = 409, description = "Slot already taken (code SLOT_CONFLICT)")
    ),
    tag = "Booking"
))]
pub async fn book_handler(
    State(state): State<Arc<BookingState>>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<AppointmentResponse>), EverpathError> {
    info!("Received booking request for agent {} at {}", request.agent_id, request.starts_at);
    let outcome = state.coordinator.book(&request).await?;
    // Side effects keep running detached.
    drop(outcome.side_effects);
    Ok((
        StatusCode::CREATED,
        Json(AppointmentResponse {
            appointment: outcome.appointment,
        }),
    ))
}

#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/appointments/{appointment_id}/cancel",
    params(("appointment_id" = String, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Appointment cancelled", body = AppointmentResponse),
        (status = 400, description = "Appointment is not active"),
        (status = 404, description = "Unknown appointment")
    ),
    tag = "Booking"
))]
pub async fn cancel_handler(
    State(state): State<Arc<BookingState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<AppointmentResponse>, EverpathError> {
    let outcome = state.coordinator.cancel(&appointment_id).await?;
    drop(outcome.side_effects);
    Ok(Json(AppointmentResponse {
        appointment: outcome.appointment,
    }))
}
