//! Domain errors for the assessment engine.

use std::time::Duration;
use thiserror::Error;

/// Domain-level errors that can occur while running an assessment.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid state transition: {reason}")]
    InvalidStateTransition { reason: String },

    #[error("Item generation failed: {0}")]
    GenerationFailed(String),

    #[error("Item generation timed out after {}ms", .0.as_millis())]
    GenerationTimeout(Duration),

    #[error("Profile store unavailable: {0}")]
    ProfileUnavailable(String),

    #[error("Path builder failed: {0}")]
    PathBuilderFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
