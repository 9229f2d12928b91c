//! Error handling for the B2B commerce workflow
//!
//! Every workflow operation returns `AppResult<T>`. The variants map one-to-one
//! onto the failure categories callers act on; infrastructure failures are kept
//! apart so they never masquerade as workflow rule violations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::TransitionError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Workflow errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Stale status: {0}")]
    StaleStatus(String),

    // Collaborator errors
    #[error("Adapter error: {0}")]
    AdapterError(String),

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

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn conflict(resource: &str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            resource: resource.to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying from a fresh read may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StaleStatus(_) | AppError::AdapterError(_))
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match errors.field_errors().into_iter().next() {
            Some((field, details)) => {
                let message = details
                    .first()
                    .and_then(|d| d.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::Validation {
                    field: field.to_string(),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub retryable: bool,
}

impl ErrorDetail {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            field: None,
            retryable: false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, mut error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new("FORBIDDEN", msg.clone()),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INVALID_STATE",
                    format!("This step isn't allowed right now: {}", msg),
                ),
            ),
            AppError::Conflict { resource, message } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(resource.clone()),
                    ..ErrorDetail::new("CONFLICT", message.clone())
                },
            ),
            AppError::StaleStatus(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new(
                    "STALE_STATUS",
                    format!("Already handled by someone else: {}", msg),
                ),
            ),
            AppError::AdapterError(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("ADAPTER_ERROR", format!("Inventory service error: {}", msg)),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred".to_string()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                ),
            ),
        };
        error_detail.retryable = self.is_retryable();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
