//! Bounded pools of exclusive model instances.
//!
//! Each model type owns one [`ModelPool`] holding a fixed number of
//! kernels. Callers check an instance out with [`ModelPool::acquire`],
//! which suspends with a deadline when every instance is busy, and return
//! it by dropping the [`ModelLease`]. Waiters are served in arrival order:
//! a release hands the instance directly to the eldest waiter still
//! holding its slot rather than racing everyone on a shared queue.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::kernel::{KernelError, KernelFactory, KernelSpec, ModelKernel};

pub mod monitor;
pub mod registry;

pub use monitor::{ConcurrencyMonitor, MonitorStats, RequestGuard};
pub use registry::PoolRegistry;

/// Why an acquire did not produce an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("timed out waiting for a model instance")]
    Timeout,

    #[error("model pool is disabled")]
    Disabled,

    #[error("model pool is shut down")]
    Shutdown,
}

/// Why a pool could not be initialized.
#[derive(Debug, Error)]
pub enum PoolInitError {
    #[error("model pool for type {0} is already initialized")]
    AlreadyInitialized(u32),

    #[error("model file does not exist: {0}")]
    MissingModelFile(String),

    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f32),

    #[error("failed to construct model instance {index}: {source}")]
    Construction {
        index: usize,
        #[source]
        source: KernelError,
    },
}

/// Mutually consistent snapshot of one pool, taken under its lock.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub model_type: u32,
    pub total: usize,
    pub available: usize,
    pub busy: usize,
    pub enabled: bool,
    pub model_path: String,
    pub variant: u32,
    pub threshold: f32,
}

/// Monotonic pool counters, readable without the pool lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCounters {
    pub acquires: u64,
    pub releases: u64,
    pub timeouts: u64,
}

struct PooledInstance {
    slot: u64,
    kernel: Box<dyn ModelKernel>,
}

struct Waiter {
    id: u64,
    /// Handoff slot. A release sends a live lease here; shutdown drops the
    /// sender, which the waiter observes as a closed channel. Sending a
    /// lease rather than a bare instance means a waiter that vanishes
    /// after the handoff still returns the instance to the pool.
    tx: oneshot::Sender<ModelLease>,
}

struct Descriptor {
    path: String,
    threshold: f32,
}

#[derive(Default)]
struct PoolInner {
    descriptor: Option<Descriptor>,
    /// Slot ids of every instance this pool owns, held or not.
    live: HashSet<u64>,
    available: VecDeque<PooledInstance>,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

/// Bounded set of instances for one model type.
pub struct ModelPool {
    model_type: u32,
    variant: u32,
    max_size: usize,
    default_acquire_timeout: Duration,
    factory: Arc<dyn KernelFactory>,
    inner: Mutex<PoolInner>,
    enabled: AtomicBool,
    shutdown: AtomicBool,
    acquires: AtomicU64,
    releases: AtomicU64,
    timeouts: AtomicU64,
}

impl ModelPool {
    pub fn new(
        model_type: u32,
        max_size: usize,
        default_acquire_timeout: Duration,
        factory: Arc<dyn KernelFactory>,
    ) -> Self {
        Self {
            model_type,
            variant: model_type % 3,
            max_size,
            default_acquire_timeout,
            factory,
            inner: Mutex::new(PoolInner::default()),
            enabled: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            acquires: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Construct and enqueue exactly `max_size` instances, then enable the
    /// pool. Rolls back completely if any single construction fails: the
    /// already-built instances are closed and the pool stays empty.
    pub fn init(&self, model_path: &str, threshold: f32) -> Result<(), PoolInitError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PoolInitError::InvalidThreshold(threshold));
        }
        if !Path::new(model_path).is_file() {
            return Err(PoolInitError::MissingModelFile(model_path.to_string()));
        }

        let mut inner = self.inner.lock();
        if inner.descriptor.is_some() {
            warn!(model_type = self.model_type, "model pool already initialized");
            return Err(PoolInitError::AlreadyInitialized(self.model_type));
        }

        let spec = KernelSpec {
            path: model_path.to_string(),
            variant: self.variant,
            model_type: self.model_type,
            threshold,
        };

        let mut built: Vec<Box<dyn ModelKernel>> = Vec::with_capacity(self.max_size);
        for index in 0..self.max_size {
            match self.factory.construct(&spec) {
                Ok(kernel) => {
                    debug!(
                        model_type = self.model_type,
                        index, "constructed model instance"
                    );
                    built.push(kernel);
                }
                Err(source) => {
                    for mut kernel in built {
                        kernel.close();
                    }
                    return Err(PoolInitError::Construction { index, source });
                }
            }
        }

        for (slot, kernel) in built.into_iter().enumerate() {
            let slot = slot as u64;
            inner.live.insert(slot);
            inner.available.push_back(PooledInstance { slot, kernel });
        }
        inner.descriptor = Some(Descriptor {
            path: model_path.to_string(),
            threshold,
        });
        drop(inner);

        self.enabled.store(true, Ordering::Release);
        info!(
            model_type = self.model_type,
            instances = self.max_size,
            "model pool initialized"
        );
        Ok(())
    }

    /// Check an instance out.
    ///
    /// `timeout_ms == 0` polls once; a negative value uses the configured
    /// default acquire timeout. Every call is counted, including rejected
    /// ones. Waiters are resumed in FIFO order; a waiter woken by shutdown
    /// gets `Shutdown` even when an instance could still be dequeued.
    pub async fn acquire(self: Arc<Self>, timeout_ms: i64) -> Result<ModelLease, AcquireError> {
        self.acquires.fetch_add(1, Ordering::Relaxed);

        if self.shutdown.load(Ordering::Acquire) {
            debug!(model_type = self.model_type, "acquire on shut-down pool");
            return Err(AcquireError::Shutdown);
        }
        if !self.enabled.load(Ordering::Acquire) {
            debug!(model_type = self.model_type, "acquire on disabled pool");
            return Err(AcquireError::Disabled);
        }

        let (waiter_id, mut rx) = {
            let mut inner = self.inner.lock();
            if self.shutdown.load(Ordering::Acquire) {
                return Err(AcquireError::Shutdown);
            }
            if let Some(instance) = inner.available.pop_front() {
                debug!(
                    model_type = self.model_type,
                    remaining = inner.available.len(),
                    "acquired model instance"
                );
                drop(inner);
                return Ok(ModelLease::new(self, instance));
            }
            if timeout_ms == 0 {
                drop(inner);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(AcquireError::Timeout);
            }
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(Waiter { id, tx });
            (id, rx)
        };

        let wait = if timeout_ms < 0 {
            self.default_acquire_timeout
        } else {
            Duration::from_millis(timeout_ms as u64)
        };

        match tokio::time::timeout(wait, &mut rx).await {
            Ok(Ok(lease)) => Ok(lease),
            // Sender dropped without a handoff: the pool drained its
            // waiters during shutdown.
            Ok(Err(_)) => Err(AcquireError::Shutdown),
            Err(_elapsed) => {
                // A release may have handed us a lease in the same instant
                // the deadline fired. Deregister under the lock and keep
                // whatever was already signalled.
                let still_queued = {
                    let mut inner = self.inner.lock();
                    match inner.waiters.iter().position(|w| w.id == waiter_id) {
                        Some(pos) => {
                            inner.waiters.remove(pos);
                            true
                        }
                        None => false,
                    }
                };
                if still_queued {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        model_type = self.model_type,
                        timeout_ms = wait.as_millis() as u64,
                        "model acquisition timed out"
                    );
                    return Err(AcquireError::Timeout);
                }
                // Our slot was consumed: either a release handed a lease
                // over, or shutdown dropped the sender.
                match rx.try_recv() {
                    Ok(lease) => Ok(lease),
                    Err(_) => Err(AcquireError::Shutdown),
                }
            }
        }
    }

    /// Return an instance to circulation. Called from [`ModelLease`] drop.
    fn release(self: Arc<Self>, mut instance: PooledInstance) {
        if self.shutdown.load(Ordering::Acquire) {
            instance.kernel.close();
            debug!(
                model_type = self.model_type,
                "instance returned after shutdown, closed"
            );
            return;
        }

        instance.kernel.reset();

        let mut inner = self.inner.lock();
        if !inner.live.contains(&instance.slot) {
            warn!(
                model_type = self.model_type,
                slot = instance.slot,
                "attempt to release an instance that does not belong to this pool"
            );
            return;
        }

        // Hand off to the eldest waiter whose receiver is still alive;
        // entries whose caller went away are skipped and discarded.
        while let Some(waiter) = inner.waiters.pop_front() {
            let lease = ModelLease::new(Arc::clone(&self), instance);
            match waiter.tx.send(lease) {
                Ok(()) => {
                    let remaining = inner.waiters.len();
                    drop(inner);
                    self.releases.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        model_type = self.model_type,
                        waiters = remaining,
                        "released instance directly to waiter"
                    );
                    return;
                }
                Err(returned) => instance = returned.into_instance(),
            }
        }

        inner.available.push_back(instance);
        let available = inner.available.len();
        drop(inner);
        self.releases.fetch_add(1, Ordering::Relaxed);
        debug!(
            model_type = self.model_type,
            available, "released model instance"
        );
    }

    /// Gate new acquires. Holders and parked waiters are unaffected.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            info!(model_type = self.model_type, enabled, "model pool toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Latch the pool shut: wake every waiter with `Shutdown`, close every
    /// idle instance and forget the rest (holders close theirs on release).
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(model_type = self.model_type, "shutting down model pool");

        let (waiters, instances) = {
            let mut inner = self.inner.lock();
            let waiters: Vec<Waiter> = inner.waiters.drain(..).collect();
            let instances: Vec<PooledInstance> = inner.available.drain(..).collect();
            inner.live.clear();
            (waiters, instances)
        };

        // Dropping the senders wakes every waiter with a closed channel,
        // which acquire reports as Shutdown.
        drop(waiters);
        for mut instance in instances {
            instance.kernel.close();
        }

        let counters = self.counters();
        info!(
            model_type = self.model_type,
            acquires = counters.acquires,
            releases = counters.releases,
            timeouts = counters.timeouts,
            "model pool shut down"
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Snapshot the pool under its lock so the three counts agree.
    pub fn status(&self) -> PoolStatus {
        let inner = self.inner.lock();
        let total = inner.live.len();
        let available = inner.available.len();
        PoolStatus {
            model_type: self.model_type,
            total,
            available,
            busy: total - available,
            enabled: self.enabled.load(Ordering::Acquire),
            model_path: inner
                .descriptor
                .as_ref()
                .map(|d| d.path.clone())
                .unwrap_or_default(),
            variant: self.variant,
            threshold: inner.descriptor.as_ref().map(|d| d.threshold).unwrap_or(0.0),
        }
    }

    pub fn counters(&self) -> PoolCounters {
        PoolCounters {
            acquires: self.acquires.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    pub fn model_type(&self) -> u32 {
        self.model_type
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Drop for ModelPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Scoped checkout of one model instance.
///
/// The instance goes back to its pool when the lease is dropped, on every
/// exit path including unwinding. [`ModelLease::kernel`] gives the holder
/// exclusive access for the duration of the lease.
pub struct ModelLease {
    pool: Arc<ModelPool>,
    instance: Option<PooledInstance>,
}

impl ModelLease {
    fn new(pool: Arc<ModelPool>, instance: PooledInstance) -> Self {
        Self {
            pool,
            instance: Some(instance),
        }
    }

    pub fn kernel(&mut self) -> &mut dyn ModelKernel {
        self.instance
            .as_mut()
            .expect("lease holds its instance until dropped")
            .kernel
            .as_mut()
    }

    fn into_instance(mut self) -> PooledInstance {
        self.instance
            .take()
            .expect("lease holds its instance until dropped")
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("model_type", &self.pool.model_type)
            .field("slot", &self.instance.as_ref().map(|i| i.slot))
            .finish()
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            Arc::clone(&self.pool).release(instance);
        }
    }
}
