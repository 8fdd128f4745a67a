//! Error taxonomy and HTTP mapping
//!
//! Library code returns [`StaffSyncError`]; API handlers attach the request
//! path via [`IntoApiResult::at`] so the error envelope carries it. Unexpected
//! failures are logged with a generated trace id which is echoed back to the
//! caller for support correlation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::response::ErrorResponse;

#[derive(Error, Debug)]
pub enum StaffSyncError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("{entity} already exists with {field}={value}")]
    Conflict { entity: String, field: String, value: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Not implemented: {message}")]
    Unimplemented { message: String },

    #[error("Malformed event: {message}")]
    MalformedEvent { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Bus error: {message}")]
    Bus { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StaffSyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into() }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied { message: message.into() }
    }

    pub fn malformed_event(message: impl Into<String>) -> Self {
        Self::MalformedEvent { message: message.into() }
    }

    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::MalformedEvent { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Auth { .. } => StatusCode::UNAUTHORIZED,
            Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Self::Unimplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::Database(_) | Self::Serialization(_) | Self::Bus { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Auth { .. } => "UNAUTHORIZED",
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::Unimplemented { .. } => "NOT_IMPLEMENTED",
            Self::MalformedEvent { .. } => "MALFORMED_EVENT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Bus { .. } => "BUS_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether a consumer should retry the message that produced this error.
    /// Store and bus failures are transient; the rest are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Bus { .. } | Self::Internal { .. })
    }
}

/// A service error bound to the request path that produced it.
///
/// Handlers convert `Result<T, StaffSyncError>` with [`IntoApiResult::at`] so
/// the envelope's `path` field is populated without threading the URI through
/// every service call.
#[derive(Debug)]
pub struct ApiFailure {
    pub error: StaffSyncError,
    pub path: String,
}

impl ApiFailure {
    pub fn new(error: StaffSyncError, path: impl Into<String>) -> Self {
        Self { error, path: path.into() }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let trace_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                trace_id = %trace_id,
                path = %self.path,
                error = %self.error,
                "Request failed"
            );
        } else {
            tracing::warn!(
                trace_id = %trace_id,
                path = %self.path,
                error = %self.error,
                "Request rejected"
            );
        }

        // 5xx details are kept out of the payload; the trace id is enough.
        let message = if status.is_server_error() {
            "An unexpected error occurred".to_string()
        } else {
            self.error.to_string()
        };

        let body = ErrorResponse::new(
            status.as_u16(),
            self.error.error_code(),
            message,
            self.path,
            trace_id,
        );

        (status, Json(body)).into_response()
    }
}

pub trait IntoApiResult<T> {
    fn at(self, path: &str) -> Result<T, ApiFailure>;
}

impl<T> IntoApiResult<T> for Result<T, StaffSyncError> {
    fn at(self, path: &str) -> Result<T, ApiFailure> {
        self.map_err(|error| ApiFailure::new(error, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(
            StaffSyncError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StaffSyncError::not_found("User", 7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StaffSyncError::conflict("Department", "name", "Sales").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            StaffSyncError::auth("bad credentials").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StaffSyncError::access_denied("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            StaffSyncError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_infrastructure_errors_are_retryable() {
        assert!(StaffSyncError::bus("send failed").is_retryable());
        assert!(!StaffSyncError::validation("bad").is_retryable());
        assert!(!StaffSyncError::not_found("User", 1).is_retryable());
        assert!(!StaffSyncError::conflict("User", "email", "a@x.com").is_retryable());
    }
}
