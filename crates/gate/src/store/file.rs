// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store: one JSON file per key, watched for cross-process
//! writes.
//!
//! Each key lives in `<dir>/<key>.json` and is replaced atomically
//! (write temp + rename), so a reader never observes a torn value. A
//! directory watcher turns other processes' renames into [`StoreChange`]
//! notifications; a per-handle snapshot of last-seen content suppresses
//! notifications for this handle's own writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;

use crate::store::{KvStore, StoreChange};

const CHANNEL_CAPACITY: usize = 64;

type Snapshot = Arc<Mutex<HashMap<String, Option<String>>>>;

/// One process's handle onto a directory-backed store.
pub struct FileStore {
    dir: PathBuf,
    snapshot: Snapshot,
    tx: broadcast::Sender<StoreChange>,
    // Held for its lifetime; dropping it stops notifications.
    _watcher: RecommendedWatcher,
}

impl FileStore {
    /// Open (creating if needed) the store directory and start watching it.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let snapshot: Snapshot = Arc::new(Mutex::new(HashMap::new()));

        let watch_tx = tx.clone();
        let watch_snapshot = Arc::clone(&snapshot);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else { return };
                for path in &event.paths {
                    let Some(key) = key_for_path(path) else { continue };
                    let value = std::fs::read_to_string(path).ok();
                    let mut snap =
                        watch_snapshot.lock().unwrap_or_else(PoisonError::into_inner);
                    if snap.get(&key) != Some(&value) {
                        snap.insert(key.clone(), value.clone());
                        drop(snap);
                        let _ = watch_tx.send(StoreChange { key, value });
                    }
                }
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self { dir, snapshot, tx, _watcher: watcher })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn remember(&self, key: &str, value: Option<String>) {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }
}

impl KvStore for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&self, key: &str, value: &str) {
        // Snapshot first, so the watcher sees content == snapshot when the
        // rename event for our own write arrives.
        self.remember(key, Some(value.to_owned()));
        if let Err(e) = save_atomic(&self.path_for(key), value) {
            tracing::warn!(key, err = %e, "failed to write store key");
        }
    }

    fn remove(&self, key: &str) {
        self.remember(key, None);
        if let Err(e) = std::fs::remove_file(self.path_for(key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key, err = %e, "failed to remove store key");
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

/// Map a watched path back to its store key. Temp files don't qualify.
fn key_for_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let key = name.strip_suffix(".json")?;
    Some(key.to_owned())
}

/// Save atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) to avoid corruption when
/// concurrent saves race on the same `.tmp` file — a shorter write can leave
/// trailing bytes from a longer previous write.
fn save_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
