//! Error types for Quillpress
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Application-wide error type
///
/// Domain failures (validation, missing aggregates, lifecycle and
/// restriction violations) are ordinary variants so command handlers can
/// surface a specific reason to the author or moderator.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Access denied (403)
    #[error("Access denied")]
    Forbidden,

    /// Bad input shape or length (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Version in use, lost optimistic-concurrency race (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The current version is already published (409)
    #[error("Chapter version is already published")]
    AlreadyPublished,

    /// Unpublish requested for a chapter without a published version (409)
    #[error("Chapter is not published")]
    NotPublished,

    /// Scheduled publication date is not in the future (422)
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// User is muted or publish-restricted (403)
    #[error("Restricted until {until}")]
    Restricted { until: DateTime<Utc> },

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Content classifier returned something unusable (502)
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/decryption error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyPublished => "already_published",
            AppError::NotPublished => "not_published",
            AppError::InvalidDate(_) => "invalid_date",
            AppError::Restricted { .. } => "restricted",
            AppError::Database(_) => "database",
            AppError::HttpClient(_) => "http_client",
            AppError::Classifier(_) => "classifier",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

/// SQLite reports lock contention as `SQLITE_BUSY`/`SQLITE_LOCKED`; the
/// losing writer of a concurrent command gets a retryable conflict.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let busy = matches!(db_err.code().as_deref(), Some("5") | Some("6"))
                || db_err.message().contains("database is locked");
            if busy {
                return AppError::Conflict("concurrent modification, retry".to_string());
            }
        }
        AppError::Database(err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(anyhow::anyhow!("Migration failed: {}", err))
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let error_type = self.error_type();
        let (status, error_message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized | AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::AlreadyPublished | AppError::NotPublished => {
                (StatusCode::CONFLICT, self.to_string())
            }
            AppError::InvalidDate(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Restricted { .. } => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::HttpClient(_) | AppError::Classifier(_) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) | AppError::Encryption(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = match &self {
            AppError::Restricted { until } => serde_json::json!({
                "error": error_message,
                "error_type": error_type,
                "until": until,
            }),
            _ => serde_json::json!({
                "error": error_message,
                "error_type": error_type,
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
