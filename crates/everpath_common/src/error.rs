use std::fmt;
use thiserror::Error;

/// The base error type shared by all Everpath crates.
///
/// Each crate keeps its own error enum and implements `From<CrateError> for EverpathError`,
/// so handlers can return a single type that knows its HTTP status.
#[derive(Error, Debug)]
pub enum EverpathError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Caller could not be authenticated (bad webhook token, missing credentials)
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Caller is known but not allowed to perform the action
    #[error("Forbidden: {0}")]
    ForbiddenError(String),

    /// Bad input
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Transient calendar or payment provider failure
    #[error("Provider error: {provider} - {message}")]
    ProviderApiError { provider: String, message: String },

    /// The requested slot is taken; callers should re-fetch availability
    #[error("Slot conflict: {0}")]
    SlotConflictError(String),

    /// A calendar connection lost its refresh token and needs new consent
    #[error("Calendar reconnect required: {0}")]
    ReconnectRequiredError(String),

    /// A charge was declined by the payment provider
    #[error("Payment declined: {0}")]
    PaymentDeclinedError(String),

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for EverpathError {
    fn status_code(&self) -> u16 {
        match self {
            EverpathError::HttpError(_) => 502,
            EverpathError::ParseError(_) => 400,
            EverpathError::ConfigError(_) => 500,
            EverpathError::AuthError(_) => 401,
            EverpathError::ForbiddenError(_) => 403,
            EverpathError::ValidationError(_) => 400,
            EverpathError::DatabaseError(_) => 500,
            EverpathError::ProviderApiError { .. } => 502,
            EverpathError::SlotConflictError(_) => 409,
            EverpathError::ReconnectRequiredError(_) => 409,
            EverpathError::PaymentDeclinedError(_) => 402,
            EverpathError::NotFoundError(_) => 404,
            EverpathError::TimeoutError(_) => 504,
            EverpathError::InternalError(_) => 500,
        }
    }
}

impl EverpathError {
    /// Stable machine-readable code for clients that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            EverpathError::HttpError(_) => "HTTP_ERROR",
            EverpathError::ParseError(_) => "PARSE_ERROR",
            EverpathError::ConfigError(_) => "CONFIG_ERROR",
            EverpathError::AuthError(_) => "UNAUTHORIZED",
            EverpathError::ForbiddenError(_) => "FORBIDDEN",
            EverpathError::ValidationError(_) => "VALIDATION_ERROR",
            EverpathError::DatabaseError(_) => "DATABASE_ERROR",
            EverpathError::ProviderApiError { .. } => "PROVIDER_API_ERROR",
            EverpathError::SlotConflictError(_) => "SLOT_CONFLICT",
            EverpathError::ReconnectRequiredError(_) => "RECONNECT_REQUIRED",
            EverpathError::PaymentDeclinedError(_) => "PAYMENT_DECLINED",
            EverpathError::NotFoundError(_) => "NOT_FOUND",
            EverpathError::TimeoutError(_) => "TIMEOUT",
            EverpathError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

// Common error conversions
impl From<reqwest::Error> for EverpathError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EverpathError::TimeoutError(err.to_string())
        } else {
            EverpathError::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EverpathError {
    fn from(err: serde_json::Error) -> Self {
        EverpathError::ParseError(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> EverpathError {
    EverpathError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> EverpathError {
    EverpathError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> EverpathError {
    EverpathError::NotFoundError(message.to_string())
}

pub fn provider_error<T: fmt::Display>(provider: &str, message: T) -> EverpathError {
    EverpathError::ProviderApiError {
        provider: provider.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> EverpathError {
    EverpathError::InternalError(message.to_string())
}
