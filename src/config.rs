//! JSON configuration document.
//!
//! The document has a `general` section (logging, concurrency limits,
//! server endpoints) and a `model` array of pool descriptors. Unknown keys
//! are ignored; a missing or unparseable file falls back to the defaults
//! below, in which case no pools are created.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default, rename = "model")]
    pub models: Vec<ModelDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default, rename = "logToFile")]
    pub log_to_file: bool,
    #[serde(default = "default_log_path", rename = "logFilePath")]
    pub log_file_path: String,
    /// 0..4 maps to DEBUG, INFO, WARN, ERROR, FATAL.
    #[serde(default = "default_log_level", rename = "logLevel")]
    pub log_level: u8,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub grpc_server: GrpcServerConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_to_file: false,
            log_file_path: default_log_path(),
            log_level: default_log_level(),
            concurrency: ConcurrencyConfig::default(),
            grpc_server: GrpcServerConfig::default(),
            http_server: HttpServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_pool_size")]
    pub model_pool_size: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_acquire_timeout")]
    pub model_acquire_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enable_concurrency_monitoring: bool,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            model_pool_size: default_pool_size(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_ms: default_request_timeout(),
            model_acquire_timeout_ms: default_acquire_timeout(),
            enable_concurrency_monitoring: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrpcServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_grpc_port")]
    pub port: u16,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_grpc_port(),
        }
    }
}

impl GrpcServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            connection_timeout: default_connection_timeout(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl HttpServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One pool descriptor: which model file to load for which model type.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub model_path: String,
    #[serde(default)]
    pub model_type: i64,
    #[serde(default = "default_threshold", rename = "objectThresh")]
    pub object_thresh: f32,
}

impl GatewayConfig {
    /// Load the document, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unreadable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file unparseable, using defaults");
                Self::default()
            }
        }
    }
}

fn default_log_path() -> String {
    "./logs".to_string()
}

fn default_log_level() -> u8 {
    1
}

fn default_pool_size() -> usize {
    3
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_acquire_timeout() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_http_port() -> u16 {
    8080
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

fn default_threshold() -> f32 {
    0.5
}
