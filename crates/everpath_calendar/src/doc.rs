// File: crates/everpath_calendar/src/doc.rs

#![cfg(feature = "openapi")]
use crate::handlers::ConnectRequest;
use everpath_common::models::{CalendarConnection, Provider};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::connect_handler,
        crate::handlers::google_webhook_handler,
        crate::handlers::microsoft_webhook_handler
    ),
    components(
        schemas(ConnectRequest, CalendarConnection, Provider)
    ),
    tags(
        (name = "Calendar", description = "Provider calendar connection and push notifications")
    ),
    servers(
        (url = "/api", description = "Everpath API server")
    )
)]
pub struct CalendarApiDoc;
