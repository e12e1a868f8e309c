//! Error handling for the Mill Roll Tracking Platform
//!
//! Every engine operation returns [`AppResult`]. The excluded transport layer
//! renders failures through [`ErrorResponse`] and [`AppError::kind`] without
//! matching on variants itself.

use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid traceability payload: {0}")]
    InvalidPayload(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("No shippable inventory: {0}")]
    NoShippableInventory(String),

    #[error("{operation} stopped at {failed_item} after {applied} update(s): {reason}")]
    PartialFailure {
        operation: String,
        failed_item: String,
        applied: usize,
        reason: String,
    },

    #[error("Sequence unavailable: {0}")]
    SequenceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

/// Coarse classification used by callers to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    Server,
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Build a field-level validation error
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidPayload(_) => "INVALID_PAYLOAD",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::NoShippableInventory(_) => "NO_SHIPPABLE_INVENTORY",
            AppError::PartialFailure { .. } => "PARTIAL_FAILURE",
            AppError::SequenceUnavailable(_) => "SEQUENCE_UNAVAILABLE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } | AppError::InvalidPayload(_) => ErrorKind::InvalidInput,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateEntry(_)
            | AppError::Conflict { .. }
            | AppError::InvalidStateTransition(_)
            | AppError::NoShippableInventory(_) => ErrorKind::Conflict,
            AppError::PartialFailure { .. }
            | AppError::SequenceUnavailable(_)
            | AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => ErrorKind::Server,
        }
    }

    /// Serializable form; server-side details are not exposed
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalError(_) => "An internal server error occurred".to_string(),
            AppError::NotFound(resource) => format!("{} not found", resource),
            other => other.to_string(),
        };
        let field = match self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::Conflict { resource, .. } => Some(resource.clone()),
            AppError::PartialFailure { failed_item, .. } => Some(failed_item.clone()),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                kind: self.kind(),
                message,
                field,
            },
        }
    }
}

/// Map a unique-constraint violation to `DuplicateEntry`, anything else to `DatabaseError`
pub fn map_unique_violation(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::DuplicateEntry(what.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
