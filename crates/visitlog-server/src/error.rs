//! API error types and their HTTP rendering.
//!
//! Only schema violations carry detail in the response body. Other errors
//! get a fixed message and their specifics go to the operational log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::any::Any;
use thiserror::Error;
use visitlog_core::schema::{FieldError, ValidationReport};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Payload failed schema validation
    #[error("Invalid telemetry payload: {0}")]
    BadRequest(ValidationReport),

    /// No route matched
    #[error("Not found")]
    NotFound,

    /// Anything unexpected. The detail is never sent to the client.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Invalid telemetry payload",
            Self::NotFound => "Not found",
            Self::Internal(_) => "Internal server error",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.public_message();

        let details = match self {
            Self::BadRequest(report) => Some(report.details),
            Self::Internal(detail) => {
                tracing::error!(
                    visitlog.event = "internal_error",
                    error = %detail,
                    "Request failed"
                );
                None
            }
            Self::NotFound => None,
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Response for a handler that panicked
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
