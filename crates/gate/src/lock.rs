// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory cross-context lock over the shared store.
//!
//! The lock is a plain record in the store; liveness comes from the
//! staleness timeout rather than an unlock handshake. Two contexts reading
//! "absent" in the same instant can still both write — the random delay
//! shrinks that window, and the refresh operation itself is idempotent, so
//! the residual race is tolerated rather than eliminated.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::GateConfig;
use crate::record::{epoch_ms, LockRecord};
use crate::store::KvStore;

/// Advisory mutual exclusion for the refresh operation.
pub struct ContextLock {
    store: Arc<dyn KvStore>,
    key: String,
    holder_id: String,
    lock_timeout_ms: u64,
    jitter_min_ms: u64,
    jitter_max_ms: u64,
}

impl ContextLock {
    pub fn new(store: Arc<dyn KvStore>, config: &GateConfig, holder_id: impl Into<String>) -> Self {
        Self {
            store,
            key: config.lock_key.clone(),
            holder_id: holder_id.into(),
            lock_timeout_ms: config.lock_timeout_ms,
            jitter_min_ms: config.jitter_min_ms,
            jitter_max_ms: config.jitter_max_ms,
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Attempt to take the lock. Returns `true` when this context now holds
    /// it, treating a stale record as absent.
    pub async fn try_acquire(&self) -> bool {
        let jitter = rand::rng().random_range(self.jitter_min_ms..=self.jitter_max_ms);
        tokio::time::sleep(Duration::from_millis(jitter)).await;

        let now = epoch_ms();
        if let Some(existing) = LockRecord::load(self.store.as_ref(), &self.key) {
            if !existing.is_stale(now, self.lock_timeout_ms) {
                tracing::debug!(holder = %existing.holder, "refresh lock held elsewhere");
                return false;
            }
            tracing::debug!(holder = %existing.holder, "refresh lock is stale, taking over");
        }

        let record = LockRecord { holder: self.holder_id.clone(), acquired_at_ms: now };
        record.save(self.store.as_ref(), &self.key);
        true
    }

    /// Release the lock, but only if we still recognize ourselves as the
    /// holder — a timeout takeover may have replaced the record meanwhile.
    pub fn release(&self) {
        match LockRecord::load(self.store.as_ref(), &self.key) {
            Some(existing) if existing.holder == self.holder_id => self.store.remove(&self.key),
            Some(existing) => {
                tracing::debug!(holder = %existing.holder, "lock was taken over, leaving it alone");
            }
            None => {}
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
