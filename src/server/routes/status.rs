//! Introspection endpoints: system, pools, concurrency.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

use crate::gateway::Gateway;

pub fn create_router() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/system", get(system_status))
        .route("/models", get(model_pools_status))
        .route("/concurrency", get(concurrency_stats))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

async fn system_status(State(gateway): State<Arc<Gateway>>) -> Json<serde_json::Value> {
    let statuses = gateway.all_pool_statuses();
    let http_stats = gateway.http_monitor().stats();
    let concurrency = &gateway.config().general.concurrency;

    let pools_summary: Vec<serde_json::Value> = statuses
        .iter()
        .map(|s| {
            json!({
                "model_type": s.model_type,
                "enabled": s.enabled,
                "total_models": s.total,
                "available_models": s.available,
                "busy_models": s.busy,
            })
        })
        .collect();

    Json(json!({
        "status": "success",
        "system_info": {
            "running": gateway.is_running(),
            "total_model_pools": statuses.len(),
        },
        "concurrency_config": {
            "max_concurrent_requests": concurrency.max_concurrent_requests,
            "model_pool_size": concurrency.model_pool_size,
            "request_timeout_ms": concurrency.request_timeout_ms,
            "model_acquire_timeout_ms": concurrency.model_acquire_timeout_ms,
            "monitoring_enabled": concurrency.enable_concurrency_monitoring,
        },
        "http_stats": {
            "active_requests": http_stats.active,
            "total_requests": http_stats.total,
            "failed_requests": http_stats.failed,
            "failure_rate": http_stats.failure_rate,
        },
        "model_pools_summary": pools_summary,
    }))
}

async fn model_pools_status(State(gateway): State<Arc<Gateway>>) -> Json<serde_json::Value> {
    let mut pools = serde_json::Map::new();
    for s in gateway.all_pool_statuses() {
        let (utilization, availability) = if s.total > 0 {
            (
                s.busy as f64 / s.total as f64,
                s.available as f64 / s.total as f64,
            )
        } else {
            (0.0, 0.0)
        };
        pools.insert(
            s.model_type.to_string(),
            json!({
                "model_type": s.model_type,
                "enabled": s.enabled,
                "model_path": s.model_path,
                "threshold": s.threshold,
                "pool_info": {
                    "total_models": s.total,
                    "available_models": s.available,
                    "busy_models": s.busy,
                },
                "efficiency": {
                    "utilization_rate": utilization,
                    "availability_rate": availability,
                },
            }),
        );
    }

    Json(json!({
        "status": "success",
        "model_pools": pools,
    }))
}

async fn concurrency_stats(State(gateway): State<Arc<Gateway>>) -> Json<serde_json::Value> {
    let stats = gateway.http_monitor().stats();
    Json(json!({
        "status": "success",
        "timestamp": unix_timestamp(),
        "http_concurrency": {
            "active_requests": stats.active,
            "total_requests": stats.total,
            "failed_requests": stats.failed,
            "success_requests": stats.total - stats.failed,
            "failure_rate": stats.failure_rate,
            "success_rate": stats.success_rate(),
        },
        "combined_stats": {
            "total_active": stats.active,
            "total_processed": stats.total,
            "total_failed": stats.failed,
            "overall_failure_rate": stats.failure_rate,
        },
    }))
}
