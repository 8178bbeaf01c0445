//! Pool enable/disable control endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::gateway::Gateway;
use crate::pool::RequestGuard;

use super::status_error;

pub fn create_router() -> Router<Arc<Gateway>> {
    Router::new().route(
        "/api/model/model_config/:name",
        get(get_model_config).post(set_model_config),
    )
}

fn parse_model_type(params: &HashMap<String, String>) -> Result<u32, Response> {
    let raw = params.get("modelType").ok_or_else(|| {
        status_error(
            StatusCode::BAD_REQUEST,
            "Missing required query parameter: modelType",
        )
    })?;
    let model_type: u32 = raw.parse().map_err(|_| {
        status_error(
            StatusCode::BAD_REQUEST,
            "Invalid modelType parameter: must be a positive integer",
        )
    })?;
    if model_type == 0 {
        return Err(status_error(
            StatusCode::BAD_REQUEST,
            "Invalid modelType parameter: must be a positive integer",
        ));
    }
    Ok(model_type)
}

fn validate_name(name: &str) -> Result<(), Response> {
    if name.is_empty() || name.len() > 50 {
        return Err(status_error(
            StatusCode::BAD_REQUEST,
            "Invalid model name length",
        ));
    }
    Ok(())
}

async fn get_model_config(
    State(gateway): State<Arc<Gateway>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let guard = RequestGuard::new(gateway.http_monitor());

    if let Err(resp) = validate_name(&name) {
        guard.fail();
        return resp;
    }
    let model_type = match parse_model_type(&params) {
        Ok(t) => t,
        Err(resp) => {
            guard.fail();
            return resp;
        }
    };

    let Some(status) = gateway.pool_status(model_type) else {
        guard.fail();
        return status_error(
            StatusCode::NOT_FOUND,
            "Model pool not found for the specified type",
        );
    };

    Json(json!({
        "status": "success",
        "model_name": name,
        "model_type": model_type,
        "enabled": status.enabled,
        "pool_info": {
            "total_models": status.total,
            "available_models": status.available,
            "busy_models": status.busy,
            "model_path": status.model_path,
            "threshold": status.threshold,
        },
    }))
    .into_response()
}

async fn set_model_config(
    State(gateway): State<Arc<Gateway>>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let guard = RequestGuard::new(gateway.http_monitor());

    if let Err(resp) = validate_name(&name) {
        guard.fail();
        return resp;
    }
    let model_type = match parse_model_type(&params) {
        Ok(t) => t,
        Err(resp) => {
            guard.fail();
            return resp;
        }
    };
    let enabled = match params.get("isEnabled").map(String::as_str) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => {
            guard.fail();
            return status_error(
                StatusCode::BAD_REQUEST,
                "Invalid isEnabled parameter: must be 'true', 'false', '1', or '0'",
            );
        }
        None => {
            guard.fail();
            return status_error(
                StatusCode::BAD_REQUEST,
                "Missing required query parameter: isEnabled",
            );
        }
    };

    if !gateway.set_model_enabled(model_type, enabled) {
        guard.fail();
        return status_error(
            StatusCode::NOT_FOUND,
            "Model pool not found for the specified type",
        );
    }

    // Snapshot after the toggle so the response reflects the new state.
    let status = gateway.pool_status(model_type);
    let (enabled_now, pool_info) = match status {
        Some(s) => (
            s.enabled,
            json!({
                "total_models": s.total,
                "available_models": s.available,
                "busy_models": s.busy,
            }),
        ),
        None => (enabled, json!({})),
    };

    Json(json!({
        "status": "success",
        "model_name": name,
        "model_type": model_type,
        "enabled": enabled_now,
        "message": "Model status updated successfully",
        "pool_info": pool_info,
    }))
    .into_response()
}
