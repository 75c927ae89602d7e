//! API error types.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level failures. Classification failures never reach this type;
/// they degrade to the `ERROR` verdict instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Rejected { status, message } = self;
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
