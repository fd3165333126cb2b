use everpath_common::EverpathError;
use everpath_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Agent not found: {0}")]
    AgentNotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),
}

impl From<SchedulingError> for EverpathError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::Validation(msg) => EverpathError::ValidationError(msg),
            SchedulingError::AgentNotFound(id) => EverpathError::NotFoundError(format!("agent {id}")),
            SchedulingError::Storage(db) => db.into(),
        }
    }
}
