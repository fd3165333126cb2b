use everpath_common::{provider_error, EverpathError, HttpStatusCode};
use thiserror::Error;

/// Stripe-specific error types.
///
/// Card declines are not errors; they come back as
/// [`ChargeOutcome::Declined`](everpath_common::services::ChargeOutcome::Declined).
#[derive(Error, Debug)]
pub enum StripeError {
    /// Error occurred during a Stripe API request
    #[error("Stripe API request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Error returned by the Stripe API
    #[error("Stripe API returned an error: {message} (Status: {status_code})")]
    ApiError { status_code: u16, message: String },

    /// Error parsing Stripe API response
    #[error("Failed to parse Stripe API response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing or incomplete Stripe configuration
    #[error("Stripe configuration missing or incomplete")]
    ConfigError,

    /// Caller passed something Stripe would reject anyway
    #[error("Invalid charge request: {0}")]
    InvalidRequest(String),
}

impl From<StripeError> for EverpathError {
    fn from(err: StripeError) -> Self {
        match err {
            StripeError::RequestError(e) if e.is_timeout() => {
                EverpathError::TimeoutError(format!("Stripe request timed out: {}", e))
            }
            StripeError::RequestError(e) => provider_error("stripe", e),
            StripeError::ApiError {
                status_code,
                message,
            } => provider_error("stripe", format!("Status: {}, Message: {}", status_code, message)),
            StripeError::ParseError(e) => {
                EverpathError::ParseError(format!("Stripe response parse error: {}", e))
            }
            StripeError::ConfigError => {
                EverpathError::ConfigError("Stripe configuration missing or incomplete".to_string())
            }
            StripeError::InvalidRequest(msg) => EverpathError::ValidationError(msg),
        }
    }
}

impl HttpStatusCode for StripeError {
    fn status_code(&self) -> u16 {
        match self {
            StripeError::RequestError(_) => 502,
            StripeError::ApiError { .. } => 502,
            StripeError::ParseError(_) => 502,
            StripeError::ConfigError => 500,
            StripeError::InvalidRequest(_) => 400,
        }
    }
}
