//! Route groups for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::GatewayError;

pub mod inference;
pub mod model_config;
pub mod status;

/// Uniform error body used by every route group.
pub(crate) fn error_response(err: &GatewayError) -> Response {
    status_error(err.http_status(), &err.to_string())
}

pub(crate) fn status_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}
