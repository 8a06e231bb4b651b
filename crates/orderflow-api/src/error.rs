//! Orderflow API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orderflow_core::error::DomainError;
use orderflow_core::queue::QueueError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The queue transport could not be set up.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// A domain error, mapped by kind.
    Domain(DomainError),
    /// The request body's content type is not accepted.
    UnsupportedMediaType(String),
    /// The queue did not accept a submitted order.
    Publish(DomainError),
}

impl ApiError {
    /// Wraps an error from the producer. Only infrastructure failures are
    /// reported as a bad gateway; anything else keeps its domain mapping.
    #[must_use]
    pub fn publish(err: DomainError) -> Self {
        match err {
            DomainError::Infrastructure(_) => Self::Publish(err),
            other => Self::Domain(other),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::Domain(err) => {
                let (status, code) = match &err {
                    DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "order_not_found"),
                    DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                    DomainError::Decode(_) => (StatusCode::BAD_REQUEST, "decode_error"),
                    DomainError::Infrastructure(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
                    }
                };
                (status, code, err.to_string())
            }
            Self::UnsupportedMediaType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                format!("unsupported content-type: {content_type}"),
            ),
            Self::Publish(err) => (StatusCode::BAD_GATEWAY, "publish_failed", err.to_string()),
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
