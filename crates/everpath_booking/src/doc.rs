// File: crates/everpath_booking/src/doc.rs

#![cfg(feature = "openapi")]
use crate::coordinator::BookingRequest;
use crate::handlers::AppointmentResponse;
use everpath_common::models::{Appointment, AppointmentStatus, RequestedWindow};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::book_handler,
        crate::handlers::cancel_handler
    ),
    components(
        schemas(
            BookingRequest,
            AppointmentResponse,
            Appointment,
            AppointmentStatus,
            RequestedWindow
        )
    ),
    tags(
        (name = "Booking", description = "Booking and cancelling appointments")
    ),
    servers(
        (url = "/api", description = "Everpath API server")
    )
)]
pub struct BookingApiDoc;
