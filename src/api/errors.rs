//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::ArcadeError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (NOT_FOUND, BAD_REQUEST, SERVICE_UNAVAILABLE, etc.)
    pub code: String,
    pub message: String,
    /// Set when the same request may succeed if sent again
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    ServiceUnavailable(String),
    InternalError(String),
}

impl ApiError {
    pub fn new(request_id: String, kind: ApiErrorKind) -> Self {
        Self { kind, request_id }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::BadRequest(message))
    }

    pub fn not_found(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::NotFound(message))
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self::new(request_id, ApiErrorKind::InternalError(message))
    }

    /// Map a service error onto its HTTP meaning
    pub fn from_service(request_id: String, err: ArcadeError) -> Self {
        let message = err.to_string();
        let kind = match err {
            ArcadeError::Unauthorized(_) => ApiErrorKind::Unauthorized(message),
            ArcadeError::RunNotFound(_) => ApiErrorKind::NotFound(message),
            ArcadeError::RunAlreadyFinalized(_) => ApiErrorKind::Conflict(message),
            ArcadeError::InvalidInput(_) | ArcadeError::UnknownGame(_) => {
                ApiErrorKind::BadRequest(message)
            }
            ArcadeError::SeedNotRevealable { .. } => ApiErrorKind::Forbidden(message),
            ref e if e.is_retryable() => ApiErrorKind::ServiceUnavailable(message),
            ArcadeError::Storage(_) => {
                error!(request_id = %request_id, error = %message, "storage failure");
                ApiErrorKind::InternalError("storage failure".to_string())
            }
            ArcadeError::Configuration(_) => {
                error!(request_id = %request_id, error = %message, "configuration failure");
                ApiErrorKind::InternalError("server misconfigured".to_string())
            }
        };
        Self::new(request_id, kind)
    }

    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match &self.kind {
            ApiErrorKind::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiErrorKind::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (status, _, message) = self.parts();
        write!(f, "[{}] {}: {}", self.request_id, status, message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                retryable: status == StatusCode::SERVICE_UNAVAILABLE,
            },
        });

        (status, body).into_response()
    }
}
