// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request gate: per-context coordinator for credential demand.
//!
//! Serves cached credentials synchronously, collapses concurrent local
//! callers into one refresh-or-wait cycle, and plays either the executor or
//! the waiter role depending on lock acquisition. Dependencies (store,
//! refresher, config) are injected, so a gate can be built per context and
//! per test without process-wide state.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, oneshot};

use crate::config::GateConfig;
use crate::lock::ContextLock;
use crate::record::{epoch_ms, CredentialRecord};
use crate::refresh::{run_executor, TokenRefresher};
use crate::store::KvStore;
use crate::waiter::wait_for_update;

const EVENT_CAPACITY: usize = 64;

/// Local refresh outcomes, for in-process subscribers.
#[derive(Debug, Clone)]
pub enum GateEvent {
    /// A refresh cycle produced a fresh credential.
    Refreshed { record: CredentialRecord },
    /// The network refresh failed; callers were resolved with a fallback.
    RefreshFailed { error: String },
}

type Resolver = oneshot::Sender<Option<CredentialRecord>>;

/// Outstanding local callers for the in-flight cycle. Drained wholesale when
/// the cycle settles; never outlives it.
#[derive(Default)]
struct CycleState {
    in_flight: bool,
    pending: Vec<Resolver>,
}

/// Per-context coordinator.
pub struct RequestGate {
    store: Arc<dyn KvStore>,
    refresher: Arc<dyn TokenRefresher>,
    lock: ContextLock,
    config: GateConfig,
    event_tx: broadcast::Sender<GateEvent>,
    cycle: Mutex<CycleState>,
}

impl RequestGate {
    /// Create a gate for one context. `context_id` doubles as the lock
    /// holder identity.
    pub fn new(
        store: Arc<dyn KvStore>,
        refresher: Arc<dyn TokenRefresher>,
        config: GateConfig,
        context_id: impl Into<String>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let lock = ContextLock::new(Arc::clone(&store), &config, context_id);
        Arc::new(Self {
            store,
            refresher,
            lock,
            config,
            event_tx,
            cycle: Mutex::new(CycleState::default()),
        })
    }

    /// Subscribe to local refresh outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.event_tx.subscribe()
    }

    pub fn context_id(&self) -> &str {
        self.lock.holder_id()
    }

    /// Resolve a credential for an outbound call.
    ///
    /// `None` means no credential exists (or it vanished mid-cycle) and the
    /// call should proceed unauthenticated. All callers that arrive while a
    /// cycle is in flight resolve with that cycle's single outcome.
    pub async fn get_credential(self: &Arc<Self>) -> Option<CredentialRecord> {
        let record = CredentialRecord::load(self.store.as_ref(), &self.config.token_key)?;
        if !record.is_expired(epoch_ms()) {
            return Some(record);
        }

        let (tx, rx) = oneshot::channel();
        let spawn_cycle = {
            let mut cycle = self.lock_cycle();
            cycle.pending.push(tx);
            if cycle.in_flight {
                false
            } else {
                cycle.in_flight = true;
                true
            }
        };

        if spawn_cycle {
            let gate = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = gate.run_cycle().await;
                gate.settle(outcome);
            });
        }

        // The cycle task always settles; a dropped sender only happens on
        // runtime teardown, where "no credential" is the right answer.
        rx.await.unwrap_or_default()
    }

    fn lock_cycle(&self) -> std::sync::MutexGuard<'_, CycleState> {
        self.cycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: Option<CredentialRecord>) {
        let pending = {
            let mut cycle = self.lock_cycle();
            cycle.in_flight = false;
            std::mem::take(&mut cycle.pending)
        };
        for tx in pending {
            let _ = tx.send(outcome.clone());
        }
    }

    /// One refresh-or-wait cycle: a bounded retry loop rather than
    /// re-entrant recursion, so repeated waiter timeouts terminate.
    async fn run_cycle(&self) -> Option<CredentialRecord> {
        for attempt in 0..self.config.max_attempts {
            // Re-read every attempt: another context may have refreshed, or
            // a logout may have cleared the record entirely.
            let record = CredentialRecord::load(self.store.as_ref(), &self.config.token_key)?;
            if !record.is_expired(epoch_ms()) {
                return Some(record);
            }

            if self.lock.try_acquire().await {
                let refreshed = run_executor(
                    &self.store,
                    &self.lock,
                    &self.refresher,
                    &self.config,
                    &self.event_tx,
                    record,
                )
                .await;
                return Some(refreshed);
            }

            tracing::debug!(attempt, "lock busy, waiting for another context's refresh");
            let waited = wait_for_update(
                &self.store,
                &self.config.token_key,
                record.expires_at_ms,
                &self.config,
            )
            .await;
            match waited {
                Some(updated) => return Some(updated),
                // Timed out: the holder's lock is stale by now, so retry the
                // whole acquisition from the top.
                None => continue,
            }
        }

        tracing::warn!("refresh attempts exhausted, proceeding with the stale credential");
        CredentialRecord::load(self.store.as_ref(), &self.config.token_key)
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
