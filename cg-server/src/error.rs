//! Error types for cg-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::{ParseError, RuntimeError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing scheduler key or locked resource (403)
    #[error("{0}")]
    Forbidden(String),

    /// Conflict (409), e.g. session already running
    #[error("{0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

    #[error("{0}")]
    Common(#[from] cg_common::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::SessionNotFound => ApiError::NotFound(err.to_string()),
            RuntimeError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            RuntimeError::NoSessionDir => ApiError::BadRequest(err.to_string()),
            RuntimeError::Common(e) => ApiError::Common(e),
            RuntimeError::Other(e) => ApiError::Other(e),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::SessionNotFound => ApiError::NotFound(err.to_string()),
            ParseError::NoTranscripts | ParseError::TextTooShort => ApiError::BadRequest(err.to_string()),
            ParseError::Failed(_) => ApiError::Internal(err.to_string()),
            ParseError::Common(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", err.to_string()),
            ApiError::Database(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", err.to_string()),
            ApiError::Other(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string()),
            ApiError::Common(ref err) => match err {
                cg_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                cg_common::Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string()),
            },
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
