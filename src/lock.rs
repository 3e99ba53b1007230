//! Per-key lock manager for stock balances
//!
//! Serializes the read-compute-write cycle on each (tenant, product,
//! warehouse) balance. Locks are per key, never coarser, so unrelated
//! products and warehouses post concurrently. Acquisition has a bounded
//! wait; hitting the bound surfaces a retryable error instead of
//! hanging.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};
use crate::types::StockKey;

/// Keyed async mutexes with bounded acquisition.
///
/// Lock entries are retained for the lifetime of the manager; the key
/// space is bounded by products x warehouses.
pub struct LockManager {
    locks: Mutex<HashMap<StockKey, Arc<Mutex<()>>>>,
    wait: Duration,
}

impl LockManager {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Acquire the lock for one balance key, waiting at most the
    /// configured bound.
    pub async fn acquire(&self, key: &StockKey) -> AppResult<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        match tokio::time::timeout(self.wait, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(
                    product_id = %key.product_id,
                    warehouse_id = %key.warehouse_id,
                    wait_ms = self.wait.as_millis() as u64,
                    "balance lock acquisition timed out"
                );
                Err(AppError::ConcurrentModification(format!(
                    "could not lock balance for product {} in warehouse {} within {}ms",
                    key.product_id,
                    key.warehouse_id,
                    self.wait.as_millis()
                )))
            }
        }
    }

    /// Acquire locks for a set of keys in sorted order. Ordered
    /// acquisition keeps overlapping multi-key approvals from
    /// deadlocking each other.
    pub async fn acquire_many(&self, keys: &[StockKey]) -> AppResult<Vec<OwnedMutexGuard<()>>> {
        let mut sorted: Vec<StockKey> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            guards.push(self.acquire(key).await?);
        }
        Ok(guards)
    }
}
