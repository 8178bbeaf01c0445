//! Configuration document parsing.

use std::io::Write;

use tempfile::NamedTempFile;

use vision_gateway::config::GatewayConfig;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn full_document_parses() {
    let file = write_config(
        r#"{
            "general": {
                "logToFile": true,
                "logFilePath": "/var/log/gateway",
                "logLevel": 2,
                "concurrency": {
                    "model_pool_size": 5,
                    "max_concurrent_requests": 32,
                    "request_timeout_ms": 10000,
                    "model_acquire_timeout_ms": 2500,
                    "enable_concurrency_monitoring": false
                },
                "grpc_server": { "host": "127.0.0.1", "port": 9000 },
                "http_server": {
                    "host": "127.0.0.1",
                    "port": 8088,
                    "connection_timeout": 15,
                    "read_timeout": 45
                }
            },
            "model": [
                {
                    "name": "vehicle",
                    "model_path": "/models/vehicle.bin",
                    "model_type": 2,
                    "objectThresh": 0.45
                },
                {
                    "name": "plate",
                    "model_path": "/models/plate.bin",
                    "model_type": 1,
                    "objectThresh": 0.6
                }
            ]
        }"#,
    );

    let config = GatewayConfig::load(file.path());
    assert!(config.general.log_to_file);
    assert_eq!(config.general.log_file_path, "/var/log/gateway");
    assert_eq!(config.general.log_level, 2);
    assert_eq!(config.general.concurrency.model_pool_size, 5);
    assert_eq!(config.general.concurrency.max_concurrent_requests, 32);
    assert_eq!(config.general.concurrency.request_timeout_ms, 10_000);
    assert_eq!(config.general.concurrency.model_acquire_timeout_ms, 2_500);
    assert!(!config.general.concurrency.enable_concurrency_monitoring);
    assert_eq!(config.general.grpc_server.addr(), "127.0.0.1:9000");
    assert_eq!(config.general.http_server.addr(), "127.0.0.1:8088");
    assert_eq!(config.general.http_server.connection_timeout, 15);
    assert_eq!(config.general.http_server.read_timeout, 45);

    assert_eq!(config.models.len(), 2);
    assert_eq!(config.models[0].name, "vehicle");
    assert_eq!(config.models[0].model_type, 2);
    assert!((config.models[0].object_thresh - 0.45).abs() < f32::EPSILON);
    assert_eq!(config.models[1].model_path, "/models/plate.bin");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = GatewayConfig::load(std::path::Path::new("/nonexistent/modelConfig.json"));
    assert_eq!(config.general.concurrency.model_pool_size, 3);
    assert_eq!(config.general.concurrency.max_concurrent_requests, 10);
    assert_eq!(config.general.concurrency.request_timeout_ms, 30_000);
    assert_eq!(config.general.concurrency.model_acquire_timeout_ms, 5_000);
    assert!(config.general.concurrency.enable_concurrency_monitoring);
    assert_eq!(config.general.grpc_server.addr(), "0.0.0.0:50051");
    assert_eq!(config.general.http_server.addr(), "0.0.0.0:8080");
    assert!(config.models.is_empty());
}

#[test]
fn unparseable_file_falls_back_to_defaults() {
    let file = write_config("{ not json");
    let config = GatewayConfig::load(file.path());
    assert!(config.models.is_empty());
    assert_eq!(config.general.log_level, 1);
}

#[test]
fn unknown_keys_are_ignored() {
    let file = write_config(
        r#"{
            "general": {
                "logLevel": 3,
                "threadPoolSize": 4,
                "extraOptions": { "monitorInterval": 10 }
            },
            "model": [],
            "future_section": { "x": 1 }
        }"#,
    );
    let config = GatewayConfig::load(file.path());
    assert_eq!(config.general.log_level, 3);
}

#[test]
fn partial_sections_keep_defaults_for_the_rest() {
    let file = write_config(
        r#"{
            "general": {
                "concurrency": { "model_pool_size": 8 }
            },
            "model": [
                { "name": "only", "model_path": "/m.bin", "model_type": 6 }
            ]
        }"#,
    );
    let config = GatewayConfig::load(file.path());
    assert_eq!(config.general.concurrency.model_pool_size, 8);
    assert_eq!(config.general.concurrency.max_concurrent_requests, 10);
    assert_eq!(config.general.http_server.port, 8080);
    // objectThresh omitted: descriptor falls back to the default threshold.
    assert!((config.models[0].object_thresh - 0.5).abs() < f32::EPSILON);
}
