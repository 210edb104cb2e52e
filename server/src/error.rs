//! HTTP error type for the REST handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400 with `{ "error": message }`.
    #[error("{0}")]
    BadRequest(&'static str),

    /// 500 with `{ "error": message }`. The cause is logged, not returned.
    #[error("{0}")]
    Storage(&'static str),

    /// 500 with `{ "error": code, "message": message }`.
    #[error("{code}: {message}")]
    Failed { code: &'static str, message: String },

    /// Upstream responded with a non-success status; passed through unchanged.
    #[error("{code}: upstream returned {status}")]
    Upstream {
        code: &'static str,
        status: StatusCode,
        body: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Storage(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Failed { code, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": code, "message": message })),
            )
                .into_response(),
            ApiError::Upstream { code, status, body } => (
                status,
                Json(json!({ "error": code, "status": status.as_u16(), "body": body })),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
