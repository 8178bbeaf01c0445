//! Model inference endpoint.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::gateway::{Gateway, InferenceRequest};
use crate::pool::RequestGuard;

use super::{error_response, status_error};

pub fn create_router() -> Router<Arc<Gateway>> {
    Router::new().route("/api/model/inference", post(inference))
}

#[derive(Debug, Deserialize)]
struct InferenceHttpRequest {
    img: String,
    #[serde(rename = "modelType")]
    model_type: i64,
    #[serde(default)]
    timeout: Option<i64>,
    #[serde(default, rename = "startValue")]
    start_value: Option<f64>,
    #[serde(default, rename = "endValue")]
    end_value: Option<f64>,
}

async fn inference(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let monitor = gateway.http_monitor();
    let guard = RequestGuard::new(monitor);

    // Field errors are reported as 400, not as an extractor rejection, so
    // they reach the monitor and share the uniform error body.
    let request: InferenceHttpRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            guard.fail();
            return error_response(&GatewayError::BadRequest(e.to_string()));
        }
    };

    // Advisory admission limit: reject before touching the pool when the
    // front-end is already at its configured concurrency.
    let max_concurrent = gateway.config().general.concurrency.max_concurrent_requests;
    if monitor.is_enabled() && monitor.stats().active > max_concurrent as i64 {
        guard.fail();
        warn!(max_concurrent, "request rejected by admission limit");
        return status_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "too many concurrent requests",
        );
    }

    let Ok(model_type) = u32::try_from(request.model_type) else {
        guard.fail();
        return error_response(&GatewayError::BadRequest(
            "modelType must be a positive integer".into(),
        ));
    };
    if model_type == 0 {
        guard.fail();
        return error_response(&GatewayError::BadRequest(
            "modelType must be a positive integer".into(),
        ));
    }
    if request.img.is_empty() {
        guard.fail();
        return error_response(&GatewayError::BadImage("empty image data".into()));
    }

    let bytes = match BASE64.decode(request.img.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            guard.fail();
            return error_response(&GatewayError::BadImage(format!("base64 decode failed: {e}")));
        }
    };
    let image = match image::load_from_memory(&bytes) {
        Ok(image) => image,
        Err(e) => {
            guard.fail();
            return error_response(&GatewayError::BadImage(format!("image decode failed: {e}")));
        }
    };
    let (width, height) = (image.width(), image.height());
    debug!(model_type, width, height, "processing inference request");

    let result = gateway
        .execute_inference(InferenceRequest {
            model_type,
            image,
            start_value: request.start_value.unwrap_or(0.0),
            end_value: request.end_value.unwrap_or(0.0),
            timeout_ms: request.timeout.unwrap_or(-1),
        })
        .await;

    match result {
        Ok(response) => {
            let mut body = json!({
                "status": "success",
                "message": format!("Processing successful (time: {}ms)", response.elapsed_ms),
                "image_width": width,
                "image_height": height,
                "detect_results": response.detections,
                "plate_results": response.plates,
                "detect_type": model_type,
                "processing_time_ms": response.elapsed_ms,
            });
            if let Some(gauge) = response.gauge_value {
                body["gauge_value"] = json!(gauge);
            }
            if monitor.is_enabled() {
                let stats = monitor.stats();
                body["concurrency_info"] = json!({
                    "active_requests": stats.active,
                    "total_requests": stats.total,
                    "failed_requests": stats.failed,
                });
            }
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => {
            guard.fail();
            error_response(&e)
        }
    }
}
