//! The gateway: lifecycle management, the inference coordinator and the
//! control surface over the pool registry.
//!
//! One `Gateway` is built per process, wrapped in an `Arc` and handed to
//! both protocol front-ends. Tests construct their own with a mock kernel
//! factory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::kernel::{CellValue, KernelError, KernelFactory, KernelOutput};
use crate::pool::{
    AcquireError, ConcurrencyMonitor, ModelPool, PoolRegistry, PoolStatus,
};

/// Model types whose kernels read license plates; their plate strings are
/// part of the response.
const PLATE_MODEL_TYPES: [u32; 2] = [1, 4];

/// Model type whose kernel reads an analog gauge within a caller-supplied
/// value range.
const GAUGE_MODEL_TYPE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    Stopped,
}

/// A typed inference request, already decoded by a front-end.
pub struct InferenceRequest {
    pub model_type: u32,
    pub image: image::DynamicImage,
    pub start_value: f64,
    pub end_value: f64,
    /// Client acquire timeout in milliseconds; values <= 0 select the
    /// configured default.
    pub timeout_ms: i64,
}

/// Results of one inference call.
#[derive(Debug, Default)]
pub struct InferenceResponse {
    pub detections: Vec<Vec<CellValue>>,
    pub plates: Vec<String>,
    pub gauge_value: Option<f64>,
    pub elapsed_ms: u64,
}

/// What `init` accomplished. Initialization is best-effort per
/// descriptor: the gateway runs degraded when some pools fail.
#[derive(Debug, Default)]
pub struct InitReport {
    pub live: Vec<u32>,
    pub failed: Vec<String>,
    pub already_initialized: bool,
}

pub struct Gateway {
    config: GatewayConfig,
    registry: PoolRegistry,
    http_monitor: ConcurrencyMonitor,
    grpc_monitor: ConcurrencyMonitor,
    factory: Arc<dyn KernelFactory>,
    lifecycle: Mutex<Lifecycle>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, factory: Arc<dyn KernelFactory>) -> Self {
        let monitoring = config.general.concurrency.enable_concurrency_monitoring;
        Self {
            config,
            registry: PoolRegistry::new(),
            http_monitor: ConcurrencyMonitor::new(monitoring),
            grpc_monitor: ConcurrencyMonitor::new(monitoring),
            factory,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
        }
    }

    /// Build every pool from the configured descriptors, in order.
    ///
    /// A duplicate model type or a failing descriptor is logged and
    /// skipped; the remaining descriptors still initialize. Calling this
    /// twice is a warning, not an error.
    pub fn init(&self) -> InitReport {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Uninitialized => {}
            _ => {
                warn!("gateway already initialized, ignoring repeated init");
                return InitReport {
                    already_initialized: true,
                    ..InitReport::default()
                };
            }
        }

        let concurrency = &self.config.general.concurrency;
        let pool_size = concurrency.model_pool_size.max(1);
        let default_timeout = Duration::from_millis(concurrency.model_acquire_timeout_ms);

        let mut report = InitReport::default();
        for descriptor in &self.config.models {
            let Ok(model_type) = u32::try_from(descriptor.model_type) else {
                warn!(
                    name = %descriptor.name,
                    model_type = descriptor.model_type,
                    "descriptor has an invalid model type, skipping"
                );
                report.failed.push(descriptor.name.clone());
                continue;
            };
            if model_type == 0 {
                warn!(name = %descriptor.name, "descriptor has model type 0, skipping");
                report.failed.push(descriptor.name.clone());
                continue;
            }
            if self.registry.contains(model_type) {
                warn!(
                    name = %descriptor.name,
                    model_type,
                    "duplicate model type in configuration, skipping"
                );
                continue;
            }

            let pool = Arc::new(ModelPool::new(
                model_type,
                pool_size,
                default_timeout,
                Arc::clone(&self.factory),
            ));
            match pool.init(&descriptor.model_path, descriptor.object_thresh) {
                Ok(()) => {
                    self.registry.insert(pool);
                    report.live.push(model_type);
                }
                Err(e) => {
                    error!(
                        name = %descriptor.name,
                        model_type,
                        error = %e,
                        "model pool initialization failed"
                    );
                    report.failed.push(descriptor.name.clone());
                }
            }
        }

        *lifecycle = Lifecycle::Running;
        info!(
            live = report.live.len(),
            failed = report.failed.len(),
            pool_size,
            "gateway initialized"
        );
        report
    }

    /// Run one typed inference request end to end: resolve the pool,
    /// acquire an instance, run the kernel, move the results out, release.
    ///
    /// The release happens on every exit path; an inference failure never
    /// leaks the instance.
    pub async fn execute_inference(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let model_type = request.model_type;
        let pool = self
            .registry
            .get(model_type)
            .ok_or(GatewayError::UnknownModel(model_type))?;
        if !pool.is_enabled() {
            return Err(GatewayError::Disabled(model_type));
        }

        let timeout_ms = if request.timeout_ms > 0 {
            request.timeout_ms
        } else {
            -1
        };

        let started = Instant::now();
        let mut lease = pool.acquire(timeout_ms).await.map_err(|e| match e {
            AcquireError::Timeout => GatewayError::Busy(model_type),
            AcquireError::Disabled | AcquireError::Shutdown => GatewayError::Disabled(model_type),
        })?;

        // The kernel call blocks on device I/O; run it off the async
        // workers. The lease travels into the blocking task and is dropped
        // there, so the instance is released before any error surfaces.
        let InferenceRequest {
            image,
            start_value,
            end_value,
            ..
        } = request;
        let outcome = tokio::task::spawn_blocking(move || -> Result<KernelOutput, KernelError> {
            let kernel = lease.kernel();
            kernel.set_input(image, start_value, end_value);
            kernel.infer()?;
            Ok(kernel.take_results())
        })
        .await
        .map_err(|e| GatewayError::Internal(format!("inference task failed: {e}")))?;

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                error!(model_type, error = %e, "model inference failed");
                return Err(GatewayError::InferenceFailed(e.to_string()));
            }
        };

        let mut response = InferenceResponse {
            detections: output.detections,
            elapsed_ms: started.elapsed().as_millis() as u64,
            ..InferenceResponse::default()
        };
        if PLATE_MODEL_TYPES.contains(&model_type) {
            response.plates = output.plates;
        }
        if model_type == GAUGE_MODEL_TYPE {
            response.gauge_value = output.gauge_value;
        }
        Ok(response)
    }

    /// Enable or disable a pool. Returns false when the type is unknown.
    pub fn set_model_enabled(&self, model_type: u32, enabled: bool) -> bool {
        match self.registry.get(model_type) {
            Some(pool) => {
                pool.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn is_model_enabled(&self, model_type: u32) -> bool {
        self.registry
            .get(model_type)
            .map(|pool| pool.is_enabled())
            .unwrap_or(false)
    }

    pub fn pool_status(&self, model_type: u32) -> Option<PoolStatus> {
        self.registry.get(model_type).map(|pool| pool.status())
    }

    pub fn all_pool_statuses(&self) -> Vec<PoolStatus> {
        self.registry.statuses()
    }

    pub fn http_monitor(&self) -> &ConcurrencyMonitor {
        &self.http_monitor
    }

    pub fn grpc_monitor(&self) -> &ConcurrencyMonitor {
        &self.grpc_monitor
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Running
    }

    /// Tear the gateway down: drain and shut every pool, record the final
    /// monitor snapshots. Idempotent and callable from any thread. The
    /// front-ends must already have stopped accepting requests.
    pub fn shutdown(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Stopped {
                return;
            }
            *lifecycle = Lifecycle::Stopped;
        }

        info!("shutting down gateway");
        self.registry.shutdown_all();

        let http = self.http_monitor.stats();
        let grpc = self.grpc_monitor.stats();
        info!(
            http_total = http.total,
            http_failed = http.failed,
            grpc_total = grpc.total,
            grpc_failed = grpc.failed,
            "final concurrency snapshot"
        );
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}
