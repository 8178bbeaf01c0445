use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use vision_gateway::config::GatewayConfig;
use vision_gateway::gateway::Gateway;
use vision_gateway::kernel::StubFactory;
use vision_gateway::{rpc, server};

#[derive(Parser)]
#[command(
    name = "vision-gateway",
    version,
    about = "Concurrent inference gateway for pooled vision models"
)]
struct Cli {
    /// Path to the JSON configuration document
    #[arg(long, default_value = "./modelConfig.json")]
    config: PathBuf,
}

/// Configure the subscriber from the document: numeric level 0..4 maps to
/// DEBUG..ERROR, optionally tee'd into a daily-rotated file. The returned
/// guard must live for the process lifetime so buffered log lines flush.
fn init_tracing(config: &GatewayConfig) -> Option<WorkerGuard> {
    let level = match config.general.log_level {
        0 => "debug",
        1 => "info",
        2 => "warn",
        _ => "error",
    };
    let filter = EnvFilter::builder()
        .parse_lossy(std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()));

    if config.general.log_to_file {
        let appender = RollingFileAppender::new(
            Rotation::DAILY,
            &config.general.log_file_path,
            "vision-gateway.log",
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(&cli.config);
    let _log_guard = init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "starting vision-gateway"
    );

    let gateway = Arc::new(Gateway::new(config.clone(), Arc::new(StubFactory)));
    let report = gateway.init();
    if report.live.is_empty() {
        warn!("no model pools initialized; inference requests will be rejected");
    }

    let token = CancellationToken::new();

    let grpc_addr: SocketAddr = config
        .general
        .grpc_server
        .addr()
        .parse()
        .context("invalid gRPC server address")?;
    let grpc_task = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        let token = token.clone();
        async move {
            let initializers = rpc::default_initializers(&gateway);
            let shutdown = token.clone().cancelled_owned();
            if let Err(e) = rpc::serve(grpc_addr, initializers, shutdown).await {
                error!(error = %e, "gRPC server terminated");
                token.cancel();
            }
        }
    });

    let http_task = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        let token = token.clone();
        async move {
            let shutdown = token.clone().cancelled_owned();
            if let Err(e) = server::serve(gateway, shutdown).await {
                error!(error = %e, "HTTP server terminated");
                token.cancel();
            }
        }
    });

    tokio::select! {
        _ = shutdown_signal() => info!("shutdown signal received"),
        _ = token.cancelled() => {},
    }
    token.cancel();

    // Front-ends drain first so no new acquires reach the pools, then the
    // gateway tears the pools down.
    let _ = tokio::join!(grpc_task, http_task);
    gateway.shutdown();

    info!("vision-gateway stopped");
    Ok(())
}
