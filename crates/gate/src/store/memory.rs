// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process store shared by multiple contexts of the same process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::store::{KvStore, StoreChange};

const CHANNEL_CAPACITY: usize = 64;

struct ContextEntry {
    slot: usize,
    context_id: String,
    tx: broadcast::Sender<StoreChange>,
}

struct Shared {
    map: Mutex<HashMap<String, String>>,
    /// One notification channel per live context handle.
    contexts: Mutex<Vec<ContextEntry>>,
    next_slot: AtomicUsize,
}

/// One context's handle onto a shared in-memory store.
///
/// Every handle sees the same map; change notifications fan out to every
/// handle except the writer's. Dropping a handle deregisters its channel.
pub struct MemoryStore {
    shared: Arc<Shared>,
    slot: usize,
    context_id: String,
    tx: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    /// Create a fresh store with one initial context handle.
    pub fn new(context_id: impl Into<String>) -> Self {
        let shared = Arc::new(Shared {
            map: Mutex::new(HashMap::new()),
            contexts: Mutex::new(Vec::new()),
            next_slot: AtomicUsize::new(0),
        });
        Self::attach(shared, context_id.into())
    }

    /// Open another context onto the same underlying store.
    pub fn context(&self, context_id: impl Into<String>) -> Self {
        Self::attach(Arc::clone(&self.shared), context_id.into())
    }

    fn attach(shared: Arc<Shared>, context_id: String) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let slot = shared.next_slot.fetch_add(1, Ordering::Relaxed);
        shared.contexts.lock().unwrap_or_else(PoisonError::into_inner).push(ContextEntry {
            slot,
            context_id: context_id.clone(),
            tx: tx.clone(),
        });
        Self { shared, slot, context_id, tx }
    }

    fn notify_others(&self, key: &str, value: Option<String>) {
        let contexts = self.shared.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        for entry in contexts.iter() {
            if entry.context_id != self.context_id {
                let _ =
                    entry.tx.send(StoreChange { key: key.to_owned(), value: value.clone() });
            }
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|entry| entry.slot != self.slot);
    }
}

impl KvStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.shared.map.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) {
        self.shared
            .map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        self.notify_others(key, Some(value.to_owned()));
    }

    fn remove(&self, key: &str) {
        let removed =
            self.shared.map.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
        if removed.is_some() {
            self.notify_others(key, None);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
