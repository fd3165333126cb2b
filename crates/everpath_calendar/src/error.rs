use everpath_common::models::Provider;
use everpath_common::EverpathError;
use everpath_db::DbError;
use everpath_scheduling::SchedulingError;
use thiserror::Error;

/// Errors that can occur when talking to a calendar provider or keeping its mirror in sync.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },
    #[error("Unexpected {provider} response: {message}")]
    Decode { provider: Provider, message: String },
    /// The token endpoint answered `invalid_grant`; the refresh token is dead.
    #[error("{0} rejected the refresh token")]
    InvalidGrant(Provider),
    #[error("Calendar connection {0} must be reconnected")]
    ReconnectRequired(String),
    #[error("{0} calendar integration is not configured")]
    NotConfigured(Provider),
    #[error("Webhook notification rejected: {0}")]
    Unauthorized(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl CalendarError {
    pub(crate) fn decode(provider: Provider, message: impl ToString) -> Self {
        CalendarError::Decode {
            provider,
            message: message.to_string(),
        }
    }
}

impl From<CalendarError> for EverpathError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Http(e) if e.is_timeout() => EverpathError::TimeoutError(e.to_string()),
            CalendarError::Http(e) => EverpathError::ProviderApiError {
                provider: "calendar".to_string(),
                message: e.to_string(),
            },
            CalendarError::Api {
                provider,
                status,
                message,
            } => EverpathError::ProviderApiError {
                provider: provider.to_string(),
                message: format!("{status}: {message}"),
            },
            CalendarError::Decode { provider, message } => EverpathError::ProviderApiError {
                provider: provider.to_string(),
                message,
            },
            CalendarError::InvalidGrant(provider) => {
                EverpathError::ReconnectRequiredError(format!("{provider} access was revoked"))
            }
            CalendarError::ReconnectRequired(id) => EverpathError::ReconnectRequiredError(id),
            CalendarError::NotConfigured(provider) => {
                EverpathError::NotFoundError(format!("{provider} calendar integration is disabled"))
            }
            CalendarError::Unauthorized(msg) => EverpathError::AuthError(msg),
            CalendarError::Validation(msg) => EverpathError::ValidationError(msg),
            CalendarError::NotFound(msg) => EverpathError::NotFoundError(msg),
            CalendarError::Storage(db) => db.into(),
            CalendarError::Scheduling(e) => e.into(),
        }
    }
}
