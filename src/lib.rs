//! Inference gateway core.
//!
//! Serves a fixed catalogue of vision models over HTTP/JSON and gRPC,
//! multiplexing concurrent requests onto bounded per-model pools of
//! exclusive model instances.

pub mod config;
pub mod error;
pub mod gateway;
pub mod kernel;
pub mod pool;
pub mod rpc;
pub mod server;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gateway::{Gateway, InferenceRequest, InferenceResponse};
