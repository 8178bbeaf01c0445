//! Per-protocol request counters.
//!
//! One monitor per front-end (HTTP, gRPC). Counters are plain atomics;
//! snapshots are advisory and need not be transactionally consistent
//! across fields.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Snapshot of one monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorStats {
    pub active: i64,
    pub total: u64,
    pub failed: u64,
    pub failure_rate: f64,
}

impl MonitorStats {
    pub fn success_rate(&self) -> f64 {
        1.0 - self.failure_rate
    }
}

/// Counts requests for one protocol front-end.
pub struct ConcurrencyMonitor {
    enabled: bool,
    active: AtomicI64,
    total: AtomicU64,
    failed: AtomicU64,
}

impl ConcurrencyMonitor {
    /// `enabled=false` turns every update into a no-op; snapshots then
    /// report zeros.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active: AtomicI64::new(0),
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn request_started(&self) {
        if !self.enabled {
            return;
        }
        self.active.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_completed(&self) {
        if !self.enabled {
            return;
        }
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_failed(&self) {
        if !self.enabled {
            return;
        }
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> MonitorStats {
        let total = self.total.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        MonitorStats {
            active: self.active.load(Ordering::Relaxed),
            total,
            failed,
            failure_rate: if total > 0 {
                failed as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    pub fn reset(&self) {
        self.active.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

/// Tracks one request across all exit paths.
///
/// Starting the guard counts the request; dropping it completes the
/// request exactly once. Call [`RequestGuard::fail`] before the guard goes
/// out of scope on error paths.
pub struct RequestGuard<'a> {
    monitor: &'a ConcurrencyMonitor,
}

impl<'a> RequestGuard<'a> {
    pub fn new(monitor: &'a ConcurrencyMonitor) -> Self {
        monitor.request_started();
        Self { monitor }
    }

    pub fn fail(&self) {
        self.monitor.request_failed();
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.monitor.request_completed();
    }
}
