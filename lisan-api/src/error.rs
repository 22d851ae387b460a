//! Error types for lisan-api
//!
//! Every handler returns [`ApiResult`]. [`ApiError`] is the single place
//! where failures become HTTP status codes and the JSON error body
//! `{"success": false, "message": ..., "errors": ...}`.

use crate::services::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// Field name -> validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed validation (400)
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Malformed or unacceptable request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing token or bad credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid/expired token or insufficient role (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Uniqueness or reference conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500); details are logged, never returned
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Validation error for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation(errors) => json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            }),
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Internal server error");
                json!({
                    "success": false,
                    "message": "Internal server error",
                })
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => json!({
                "success": false,
                "message": msg,
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return ApiError::NotFound("Resource not found".into());
        }

        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Conflict("Resource already exists".into());
            }
            if db_err.is_foreign_key_violation() {
                return ApiError::BadRequest("Referenced resource does not exist".into());
            }
        }

        ApiError::Internal(err.to_string())
    }
}

impl From<lisan_common::Error> for ApiError {
    fn from(err: lisan_common::Error) -> Self {
        use lisan_common::Error;

        match err {
            Error::Database(e) => e.into(),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Internal(format!("External service failed: {}", err))
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
