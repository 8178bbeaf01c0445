//! gRPC front-end.
//!
//! Services are registered through [`GrpcServiceInitializer`] so the
//! bootstrap does not name concrete service types: each initializer adds
//! itself to a shared route set, and the list of initializers is resolved
//! once at startup.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tracing::info;

use crate::gateway::Gateway;

pub mod model_service;
pub mod status_service;

pub mod proto {
    tonic::include_proto!("gateway");
}

pub use model_service::AiModelServiceImpl;
pub use status_service::StatusServiceImpl;

/// Registers one gRPC service into the server's route set.
pub trait GrpcServiceInitializer: Send + Sync {
    fn name(&self) -> &'static str;
    fn register(&self, routes: &mut RoutesBuilder);
}

pub struct AiModelServiceInitializer {
    gateway: Arc<Gateway>,
}

impl AiModelServiceInitializer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl GrpcServiceInitializer for AiModelServiceInitializer {
    fn name(&self) -> &'static str {
        "AiModelService"
    }

    fn register(&self, routes: &mut RoutesBuilder) {
        routes.add_service(proto::ai_model_service_server::AiModelServiceServer::new(
            AiModelServiceImpl::new(Arc::clone(&self.gateway)),
        ));
    }
}

pub struct StatusServiceInitializer {
    gateway: Arc<Gateway>,
}

impl StatusServiceInitializer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

impl GrpcServiceInitializer for StatusServiceInitializer {
    fn name(&self) -> &'static str {
        "StatusService"
    }

    fn register(&self, routes: &mut RoutesBuilder) {
        routes.add_service(proto::status_service_server::StatusServiceServer::new(
            StatusServiceImpl::new(Arc::clone(&self.gateway)),
        ));
    }
}

/// The full service catalogue for one gateway.
pub fn default_initializers(gateway: &Arc<Gateway>) -> Vec<Box<dyn GrpcServiceInitializer>> {
    vec![
        Box::new(AiModelServiceInitializer::new(Arc::clone(gateway))),
        Box::new(StatusServiceInitializer::new(Arc::clone(gateway))),
    ]
}

/// Bind and serve every registered service until the shutdown future
/// resolves.
pub async fn serve(
    addr: SocketAddr,
    initializers: Vec<Box<dyn GrpcServiceInitializer>>,
    shutdown: impl Future<Output = ()> + Send,
) -> Result<(), tonic::transport::Error> {
    let mut routes = RoutesBuilder::default();
    for initializer in &initializers {
        initializer.register(&mut routes);
        info!(service = initializer.name(), "registered gRPC service");
    }
    info!(%addr, "gRPC server listening");
    Server::builder()
        .add_routes(routes.routes())
        .serve_with_shutdown(addr, shutdown)
        .await
}
