// Shared building blocks for the Everpath crates.
pub mod error; // Error taxonomy and status mapping
pub mod http; // Axum error responses and the outbound client
pub mod logging; // Subscriber setup
pub mod models; // Domain records
pub mod services; // Payment and notification boundaries

pub use error::{
    config_error, internal_error, not_found, provider_error, validation_error, EverpathError,
    HttpStatusCode,
};

pub use http::{
    client::{client_from_config, create_client},
    handle_json_result,
};
