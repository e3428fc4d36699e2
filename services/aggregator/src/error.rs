use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Central error type for the HTTP surface
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("token not found: {0}")]
    NotFound(String),

    #[error("no snapshot available yet")]
    NoSnapshot,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::NoSnapshot => (
                StatusCode::SERVICE_UNAVAILABLE,
                // Distinct from NOT_FOUND: the cache is empty, the address
                // was never checked against a snapshot.
                "no snapshot available yet".to_string(),
                "NO_SNAPSHOT",
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
