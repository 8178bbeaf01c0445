//! Map from model type to its pool.
//!
//! Built once during startup and read concurrently afterwards. Lookups
//! clone the pool handle and drop the registry lock before any acquire, so
//! pool wait time never extends a registry critical section.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::{ModelPool, PoolStatus};

#[derive(Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<u32, Arc<ModelPool>>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool for its model type. The first registration wins;
    /// duplicates are rejected so a repeated descriptor cannot replace a
    /// live pool.
    pub fn insert(&self, pool: Arc<ModelPool>) -> bool {
        let model_type = pool.model_type();
        let mut pools = self.pools.write();
        if pools.contains_key(&model_type) {
            warn!(model_type, "duplicate model type, keeping existing pool");
            return false;
        }
        pools.insert(model_type, pool);
        true
    }

    pub fn contains(&self, model_type: u32) -> bool {
        self.pools.read().contains_key(&model_type)
    }

    pub fn get(&self, model_type: u32) -> Option<Arc<ModelPool>> {
        self.pools.read().get(&model_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.pools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.read().is_empty()
    }

    /// Snapshot every pool, ordered by model type for stable output.
    pub fn statuses(&self) -> Vec<PoolStatus> {
        let pools: Vec<Arc<ModelPool>> = self.pools.read().values().cloned().collect();
        let mut statuses: Vec<PoolStatus> = pools.iter().map(|p| p.status()).collect();
        statuses.sort_by_key(|s| s.model_type);
        statuses
    }

    /// Shut down every pool. Pools stay registered so late status reads
    /// see empty, shut-down pools rather than vanished ones.
    pub fn shutdown_all(&self) {
        let pools: Vec<Arc<ModelPool>> = self.pools.read().values().cloned().collect();
        info!(pools = pools.len(), "shutting down all model pools");
        for pool in pools {
            pool.shutdown();
        }
    }
}
