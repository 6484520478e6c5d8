//! HTTP error mapping
//!
//! The request edge is the sole place typed errors become status codes.
//! Every response carries the stable `error` code; the human `message` is
//! suppressed for server-side failures when running in production mode.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use stumpcast_common::Error;

static PRODUCTION_MODE: AtomicBool = AtomicBool::new(false);

/// Set once at startup from `ServerConfig::production`.
pub fn set_production_mode(enabled: bool) {
    PRODUCTION_MODE.store(enabled, Ordering::Relaxed);
}

/// API error wrapper carrying the shared taxonomy
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(error: E) -> Self {
        ApiError(error.into())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status = match &error {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let suppress_detail =
            status.is_server_error() && PRODUCTION_MODE.load(Ordering::Relaxed);
        let body = if suppress_detail {
            json!({ "error": error.code() })
        } else {
            json!({ "error": error.code(), "message": error.to_string() })
        };

        if status.is_server_error() {
            tracing::error!(code = error.code(), error = %error, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}
