//! Error handling module
//!
//! HTTP-facing error type and response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ledger::LedgerError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // Server errors (5xx)
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn classify(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            AppError::Ledger(err) => match err {
                LedgerError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
                }
                LedgerError::NotFound(what) => {
                    (StatusCode::NOT_FOUND, "not_found", Some(what.clone()))
                }
                LedgerError::Conflict(what) => {
                    (StatusCode::CONFLICT, "already_exists", Some(what.clone()))
                }
                err if err.is_retryable() => {
                    tracing::warn!("Retryable ledger error: {:?}", err);
                    (StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable", None)
                }
                LedgerError::Rollback { .. } => {
                    tracing::error!("Rollback failed: {:?}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "rollback_failed", None)
                }
                LedgerError::Commit(_) => {
                    tracing::error!("Commit failed: {:?}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "commit_failed", None)
                }
                _ => {
                    tracing::error!("Ledger error: {:?}", err);
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            },

            // 500 Internal Server Error
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = self.classify();

        let error = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error,
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
