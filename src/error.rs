//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, FieldError};
use crate::repository::RepositoryError;
use crate::sync::CounterSyncError;
use crate::vendor_store::VendorStoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid admin key")]
    InvalidAdminKey,

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),

    #[error("Counter store error: {0}")]
    Counters(#[from] CounterSyncError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(field) => AppError::Domain(DomainError::conflict(field)),
            other => AppError::Repository(other),
        }
    }
}

impl From<VendorStoreError> for AppError {
    fn from(err: VendorStoreError) -> Self {
        match err {
            VendorStoreError::Domain(e) => AppError::Domain(e),
            VendorStoreError::Repository(e) => e.into(),
            VendorStoreError::Hashing(msg) => AppError::Internal(msg),
        }
    }
}

impl From<crate::jobs::JobError> for AppError {
    fn from(err: crate::jobs::JobError) -> Self {
        match err {
            crate::jobs::JobError::Store(e) => e.into(),
            crate::jobs::JobError::Repository(e) => e.into(),
            crate::jobs::JobError::Counters(e) => AppError::Counters(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-field messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut fields = None;

        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidAdminKey => {
                (StatusCode::UNAUTHORIZED, "invalid_admin_key", None)
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(domain_err) => match domain_err {
                DomainError::Validation(errors) => {
                    fields = Some(errors.fields().to_vec());
                    (StatusCode::BAD_REQUEST, "validation_error", None)
                }
                DomainError::InvalidStatus(status) => {
                    (StatusCode::BAD_REQUEST, "invalid_status", Some(status.clone()))
                }
                DomainError::InvalidDuration(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_duration", Some(msg.clone()))
                }
                DomainError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "unauthorized", Some(msg.clone()))
                }
                DomainError::NotFound { id, .. } => {
                    (StatusCode::NOT_FOUND, "not_found", Some(id.clone()))
                }
                DomainError::Conflict { field } => {
                    (StatusCode::CONFLICT, "conflict", Some(field.clone()))
                }
                DomainError::BundleCapacityExceeded { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "bundle_capacity_exceeded",
                    Some(domain_err.to_string()),
                ),
                DomainError::BusinessRuleViolation(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "business_rule_violation",
                    Some(msg.clone()),
                ),
            },

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Repository(e) => {
                tracing::error!("Repository error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Counters(e) => {
                tracing::error!("Counter store error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "counter_store_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
            fields,
        };

        (status, Json(body)).into_response()
    }
}
