use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::db::StoreError;

/// Domain failures of the ledger services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation { message: String, details: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>, details: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateTask => ServiceError::conflict("Task already completed"),
            StoreError::UserMissing(_) => ServiceError::NotFound("User"),
            StoreError::Database(e) => ServiceError::Database(e),
        }
    }
}

/// Error rendered at the HTTP boundary as `{"error", "code", "details"}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        AppError {
            status,
            code,
            message: msg.into(),
            details: None,
        }
    }

    pub fn validation(msg: impl Into<String>, details: impl Into<String>) -> Self {
        AppError {
            details: Some(details.into()),
            ..AppError::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{} not found", resource),
        )
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::new(StatusCode::CONFLICT, "CONFLICT", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
    }

    pub fn internal() -> Self {
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation { message, details } => AppError::validation(message, details),
            ServiceError::NotFound(subject) => AppError::not_found(subject),
            ServiceError::Conflict(message) => AppError::conflict(message),
            ServiceError::Database(e) => {
                tracing::error!(error = ?e, "storage failure");
                AppError::internal()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            tracing::debug!(code = self.code, status = %self.status, "{}", self.message);
        }

        let body = match self.details {
            Some(details) => json!({ "error": self.message, "code": self.code, "details": details }),
            None => json!({ "error": self.message, "code": self.code }),
        };
        (self.status, Json(body)).into_response()
    }
}
