//! Application error types

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store unavailable: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid or missing X-API-Key.")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Try again later.")]
    TooManyRequests { retry_after: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the provider refused the request because the session
    /// cookies are missing or expired.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, AppError::Upstream { status: 401 | 403, .. })
    }

    /// Stable machine-readable code, used in API error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Store(_) => "STORE_UNAVAILABLE",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TooManyRequests { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error body returned by the query API
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_rejection_classification() {
        let unauthorized = AppError::Upstream { status: 401, url: "x".into() };
        let forbidden = AppError::Upstream { status: 403, url: "x".into() };
        let server = AppError::Upstream { status: 503, url: "x".into() };

        assert!(unauthorized.is_session_rejected());
        assert!(forbidden.is_session_rejected());
        assert!(!server.is_session_rejected());
        assert!(!AppError::MalformedPayload("x".into()).is_session_rejected());
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::from(&AppError::Unauthorized);
        assert_eq!(body.status, "error");
        assert_eq!(body.code, "UNAUTHORIZED");
        assert_eq!(body.message, "Invalid or missing X-API-Key.");
    }
}
