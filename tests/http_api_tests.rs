//! HTTP surface tests, driving the real router in-process.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tower::ServiceExt;

use common::{descriptor, model_file, png_bytes, test_config, MockFactory};
use vision_gateway::gateway::Gateway;
use vision_gateway::kernel::{CellValue, KernelOutput};
use vision_gateway::server::build_router;

fn gateway_with_detector() -> Arc<Gateway> {
    let file = model_file();
    let config = test_config(
        vec![descriptor("detector", file.path().to_str().unwrap(), 2, 0.5)],
        2,
    );
    let output = KernelOutput {
        detections: vec![vec![CellValue::Int(1), CellValue::Float(0.9)]],
        plates: vec![],
        gauge_value: None,
    };
    let gateway = Arc::new(Gateway::new(
        config,
        Arc::new(MockFactory::with_output(output)),
    ));
    gateway.init();
    gateway
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(
    gateway: Arc<Gateway>,
    request: Request<Body>,
) -> (StatusCode, serde_json::Value) {
    let app = build_router(gateway);
    let response = ServiceExt::<Request<Body>>::oneshot(app, request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1_000_000)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn inference_body(model_type: i64) -> serde_json::Value {
    serde_json::json!({
        "img": BASE64.encode(png_bytes()),
        "modelType": model_type,
    })
}

#[tokio::test]
async fn root_reports_the_service() {
    let (status, json) = send(gateway_with_detector(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["service"], "vision-gateway");
    assert_eq!(json["status"], "running");
}

#[tokio::test]
async fn inference_round_trip() {
    let gateway = gateway_with_detector();
    let (status, json) = send(
        gateway.clone(),
        post_json("/api/model/inference", inference_body(2)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["image_width"], 2);
    assert_eq!(json["image_height"], 2);
    assert_eq!(json["detect_type"], 2);
    assert_eq!(json["detect_results"][0][0], 1);
    assert!(json["processing_time_ms"].is_u64());
    assert!(json["concurrency_info"]["total_requests"].is_u64());

    // The request was tracked and completed.
    let stats = gateway.http_monitor().stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn unknown_model_type_is_404() {
    let (status, json) = send(
        gateway_with_detector(),
        post_json("/api/model/inference", inference_body(99)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn undecodable_image_is_400() {
    let gateway = gateway_with_detector();

    let (status, _) = send(
        gateway.clone(),
        post_json(
            "/api/model/inference",
            serde_json::json!({ "img": "!!!not-base64!!!", "modelType": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Valid base64, but not an image.
    let (status, _) = send(
        gateway.clone(),
        post_json(
            "/api/model/inference",
            serde_json::json!({ "img": BASE64.encode(b"plain text"), "modelType": 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stats = gateway.http_monitor().stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn missing_fields_are_400() {
    let (status, json) = send(
        gateway_with_detector(),
        post_json("/api/model/inference", serde_json::json!({ "modelType": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");

    let (status, _) = send(
        gateway_with_detector(),
        post_json(
            "/api/model/inference",
            serde_json::json!({ "img": "", "modelType": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn disabled_pool_is_503() {
    let gateway = gateway_with_detector();
    gateway.set_model_enabled(2, false);

    let (status, json) = send(
        gateway,
        post_json("/api/model/inference", inference_body(2)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn model_config_get_reports_the_pool() {
    let (status, json) = send(
        gateway_with_detector(),
        get("/api/model/model_config/detector?modelType=2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_type"], 2);
    assert_eq!(json["enabled"], true);
    assert_eq!(json["pool_info"]["total_models"], 2);
    assert_eq!(json["pool_info"]["available_models"], 2);
    assert_eq!(json["pool_info"]["busy_models"], 0);
}

#[tokio::test]
async fn model_config_post_toggles_the_pool() {
    let gateway = gateway_with_detector();

    let (status, json) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?modelType=2&isEnabled=false"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], false);
    assert!(!gateway.is_model_enabled(2));

    let (status, json) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?modelType=2&isEnabled=1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["enabled"], true);
    assert!(gateway.is_model_enabled(2));
}

#[tokio::test]
async fn model_config_validates_parameters() {
    let gateway = gateway_with_detector();

    let (status, _) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?isEnabled=true"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?modelType=abc&isEnabled=true"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?modelType=2&isEnabled=maybe"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        gateway.clone(),
        post_empty("/api/model/model_config/detector?modelType=42&isEnabled=true"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_endpoints_report_pools_and_counters() {
    let gateway = gateway_with_detector();

    // Generate one success and one failure for the counters.
    let _ = send(
        gateway.clone(),
        post_json("/api/model/inference", inference_body(2)),
    )
    .await;
    let _ = send(
        gateway.clone(),
        post_json("/api/model/inference", inference_body(99)),
    )
    .await;

    let (status, json) = send(gateway.clone(), get("/api/status/system")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["system_info"]["total_model_pools"], 1);
    assert_eq!(json["http_stats"]["total_requests"], 2);
    assert_eq!(json["http_stats"]["failed_requests"], 1);
    assert_eq!(json["model_pools_summary"][0]["model_type"], 2);

    let (status, json) = send(gateway.clone(), get("/api/status/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_pools"]["2"]["enabled"], true);
    assert_eq!(
        json["model_pools"]["2"]["pool_info"]["total_models"],
        2
    );
    assert_eq!(
        json["model_pools"]["2"]["efficiency"]["availability_rate"],
        1.0
    );

    let (status, json) = send(gateway, get("/api/status/concurrency")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["http_concurrency"]["total_requests"], 2);
    assert_eq!(json["http_concurrency"]["failed_requests"], 1);
    assert_eq!(json["http_concurrency"]["success_requests"], 1);
    assert!(json["timestamp"].is_u64());
}
