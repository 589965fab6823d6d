// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observable key-value store: the shared medium contexts coordinate through.
//!
//! The coordinator only needs four operations from its backing store, so
//! both the in-process [`memory::MemoryStore`] and the cross-process
//! [`file::FileStore`] implement the same small trait.

pub mod file;
pub mod memory;

use tokio::sync::broadcast;

/// A change observed on the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    /// New serialized value, or `None` when the key was removed.
    pub value: Option<String>,
}

/// Shared, change-notifying key-value medium.
///
/// Reads are synchronous; writes replace the whole value under a key, which
/// sidesteps partial-write interleaving given single-key atomicity. The
/// subscription channel carries writes made by *other* contexts — a context
/// never observes its own writes there.
pub trait KvStore: Send + Sync {
    fn read(&self, key: &str) -> Option<String>;
    fn write(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}
