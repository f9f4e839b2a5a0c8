//! Error types for the vidcast HTTP API.
//!
//! [`ApiError`] unifies the failure modes of the JSON endpoints into a
//! single enum that converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. The
//! media endpoints do not use it: their 404 and 500 responses carry no
//! body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request body was well-formed JSON but semantically invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A collaborator needed for this request is missing or failing.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
