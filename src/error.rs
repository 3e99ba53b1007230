//! Error handling for the warehouse inventory engine
//!
//! Every failure carries a stable error code so the surrounding service
//! layer can map it to a transport-level response without pattern
//! matching on messages.

use serde::Serialize;
use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Workflow errors
    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    #[error("Self approval not allowed: {0}")]
    SelfApprovalNotAllowed(String),

    // Ledger errors
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Error response structure for the call boundary
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    /// Stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStatusTransition(_) => "INVALID_STATUS_TRANSITION",
            AppError::SelfApprovalNotAllowed(_) => "SELF_APPROVAL_NOT_ALLOWED",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    /// Whether the caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification(_))
    }

    /// Structured detail for user-visible responses. Internal errors
    /// are reported by code only; the underlying cause stays in logs.
    pub fn detail(&self) -> ErrorDetail {
        let (message, field) = match self {
            AppError::Validation { field, message } => (message.clone(), Some(field.clone())),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            other => (other.to_string(), None),
        };

        ErrorDetail {
            code: self.code().to_string(),
            message,
            field,
        }
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
