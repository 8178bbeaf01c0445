//! Introspection over gRPC: system, pools, concurrency.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tonic::{Request, Response, Status};
use tracing::debug;

use crate::gateway::Gateway;
use crate::pool::{MonitorStats, PoolStatus};

use super::proto::status_service_server::StatusService;
use super::proto::{
    ConcurrencyStats, ConcurrencyStatsRequest, ConcurrencyStatsResponse, ModelPoolInfo,
    ModelPoolsStatusRequest, ModelPoolsStatusResponse, SystemStatusRequest, SystemStatusResponse,
};

pub struct StatusServiceImpl {
    gateway: Arc<Gateway>,
}

impl StatusServiceImpl {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

fn concurrency_stats(stats: &MonitorStats) -> ConcurrencyStats {
    ConcurrencyStats {
        active_requests: stats.active,
        total_requests: stats.total,
        failed_requests: stats.failed,
        success_requests: stats.total - stats.failed,
        failure_rate: stats.failure_rate,
        success_rate: stats.success_rate(),
    }
}

fn model_pool_info(status: &PoolStatus) -> ModelPoolInfo {
    let (utilization_rate, availability_rate) = if status.total > 0 {
        (
            status.busy as f64 / status.total as f64,
            status.available as f64 / status.total as f64,
        )
    } else {
        (0.0, 0.0)
    };
    ModelPoolInfo {
        model_type: status.model_type as i32,
        enabled: status.enabled,
        total_models: status.total as u64,
        available_models: status.available as u64,
        busy_models: status.busy as u64,
        model_path: status.model_path.clone(),
        threshold: status.threshold,
        utilization_rate,
        availability_rate,
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[tonic::async_trait]
impl StatusService for StatusServiceImpl {
    async fn get_system_status(
        &self,
        _request: Request<SystemStatusRequest>,
    ) -> Result<Response<SystemStatusResponse>, Status> {
        debug!("gRPC GetSystemStatus");
        let statuses = self.gateway.all_pool_statuses();
        let concurrency = &self.gateway.config().general.concurrency;
        let grpc_stats = self.gateway.grpc_monitor().stats();

        Ok(Response::new(SystemStatusResponse {
            success: true,
            message: "System status retrieved successfully".to_string(),
            grpc_server_running: self.gateway.is_running(),
            total_model_pools: statuses.len() as u32,
            max_concurrent_requests: concurrency.max_concurrent_requests as u32,
            model_pool_size: concurrency.model_pool_size as u32,
            request_timeout_ms: concurrency.request_timeout_ms,
            model_acquire_timeout_ms: concurrency.model_acquire_timeout_ms,
            monitoring_enabled: concurrency.enable_concurrency_monitoring,
            grpc_stats: Some(concurrency_stats(&grpc_stats)),
            model_pools: statuses.iter().map(model_pool_info).collect(),
        }))
    }

    async fn get_model_pools_status(
        &self,
        request: Request<ModelPoolsStatusRequest>,
    ) -> Result<Response<ModelPoolsStatusResponse>, Status> {
        let request = request.into_inner();
        debug!(model_type = ?request.model_type, "gRPC GetModelPoolsStatus");

        let pools = match request.model_type {
            Some(model_type) => {
                let found = u32::try_from(model_type)
                    .ok()
                    .and_then(|t| self.gateway.pool_status(t));
                match found {
                    Some(status) => vec![model_pool_info(&status)],
                    None => {
                        return Ok(Response::new(ModelPoolsStatusResponse {
                            success: false,
                            message: format!("Model pool not found for type: {model_type}"),
                            model_pools: Vec::new(),
                        }))
                    }
                }
            }
            None => self
                .gateway
                .all_pool_statuses()
                .iter()
                .map(model_pool_info)
                .collect(),
        };

        Ok(Response::new(ModelPoolsStatusResponse {
            success: true,
            message: "Model pools status retrieved successfully".to_string(),
            model_pools: pools,
        }))
    }

    async fn get_concurrency_stats(
        &self,
        _request: Request<ConcurrencyStatsRequest>,
    ) -> Result<Response<ConcurrencyStatsResponse>, Status> {
        debug!("gRPC GetConcurrencyStats");
        let stats = self.gateway.grpc_monitor().stats();

        Ok(Response::new(ConcurrencyStatsResponse {
            success: true,
            message: "Concurrency statistics retrieved successfully".to_string(),
            timestamp: unix_timestamp(),
            grpc_stats: Some(concurrency_stats(&stats)),
            total_active: stats.active,
            total_processed: stats.total,
            total_failed: stats.failed,
            overall_failure_rate: stats.failure_rate,
        }))
    }
}
