//! HTTP front-end.
//!
//! Thin translation layer: decode the wire request, call the gateway,
//! project the result (or a `GatewayError`) back to JSON.

use std::future::Future;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;
use tracing::info;

use crate::gateway::Gateway;

pub mod routes;

/// Assemble the full application router. Exposed separately from
/// [`serve`] so tests can drive it in-process.
pub fn build_router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(routes::inference::create_router())
        .merge(routes::model_config::create_router())
        .nest("/api/status", routes::status::create_router())
        .with_state(gateway)
}

/// Bind and serve until the shutdown future resolves.
pub async fn serve(
    gateway: Arc<Gateway>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = gateway.config().general.http_server.addr();
    let app = build_router(gateway);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "vision-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
