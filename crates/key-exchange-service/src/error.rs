//! Error types for the key exchange service.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Service error types.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Missing or malformed input. Raised before any storage access.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique field is already owned by another record.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ExchangeError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ExchangeError::NotFound(msg.into())
    }

    /// Whether this error is the caller's fault and safe to echo back.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExchangeError::Validation(_)
                | ExchangeError::NotFound(_)
                | ExchangeError::Conflict(_)
                | ExchangeError::RateLimitExceeded
        )
    }
}

/// Reject a missing or blank required field.
pub fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, ExchangeError> {
    if value.trim().is_empty() {
        return Err(ExchangeError::Validation(format!("{} is required", field)));
    }
    Ok(value)
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ExchangeError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ExchangeError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ExchangeError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ExchangeError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            ExchangeError::Storage(_) | ExchangeError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        // Internal causes stay in the logs.
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            error!(error = %self, "Request failed with internal error");
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ExchangeError {
    fn from(rejection: JsonRejection) -> Self {
        ExchangeError::Validation(rejection.body_text())
    }
}

impl From<rand::Error> for ExchangeError {
    fn from(e: rand::Error) -> Self {
        ExchangeError::Internal(format!("Entropy source failure: {}", e))
    }
}
