//! Error types for the prediction pipeline.

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::adapters::FetchError;
use crate::models::ValidationError;
use crate::store::StoreError;

/// Failure of one pipeline stage.
///
/// Callers only see the status code and message; the variant picks the code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Image fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Context generation failed: {0}")]
    Context(String),

    #[error("Invalid prediction result: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to save prediction: {0}")]
    Persistence(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Fetch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "image_fetch_failed"),
            Error::Prediction(_) => (StatusCode::INTERNAL_SERVER_ERROR, "prediction_failed"),
            Error::Context(_) => (StatusCode::INTERNAL_SERVER_ERROR, "context_failed"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_result"),
            Error::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Response for a handler panic, used with `CatchPanicLayer::custom`.
///
/// Keeps the regular error body shape; the panic text is only logged.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!("Request handler panicked: {}", detail);

    Error::Internal("request handler panicked".to_string()).into_response()
}
