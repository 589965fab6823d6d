// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waiter role: observe another context's refresh via push + poll.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::config::GateConfig;
use crate::record::CredentialRecord;
use crate::store::KvStore;

/// Wait for the credential under `key` to change away from
/// `initial_expires_at_ms`.
///
/// Two channels race: the store's change notifications (low-latency, but a
/// writer never sees its own writes and delivery is not guaranteed under
/// every backend) and a fixed-interval re-read as the reliability fallback.
/// The first poll fires one full interval in, so the push channel wins when
/// it works. Both channels are torn down when this future resolves.
///
/// Returns `None` after `max_wait` elapses — by then any stale lock has
/// expired, so the caller retries the whole acquisition flow instead of
/// surfacing an error.
pub async fn wait_for_update(
    store: &Arc<dyn KvStore>,
    key: &str,
    initial_expires_at_ms: u64,
    config: &GateConfig,
) -> Option<CredentialRecord> {
    let mut changes = store.subscribe();
    let mut push_open = true;

    let start = tokio::time::Instant::now();
    let mut poll = tokio::time::interval_at(start + config.poll_interval(), config.poll_interval());
    let deadline = tokio::time::sleep(config.max_wait());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => {
                tracing::debug!(key, "gave up waiting for a refresh from another context");
                return None;
            }
            change = changes.recv(), if push_open => match change {
                Ok(change) if change.key == key => {
                    let record = change.value.as_deref().and_then(CredentialRecord::parse);
                    if let Some(record) = record {
                        if record.expires_at_ms != initial_expires_at_ms {
                            return Some(record);
                        }
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(key, skipped, "change notifications lagged, relying on poll");
                }
                Err(RecvError::Closed) => push_open = false,
            },
            _ = poll.tick() => {
                if let Some(record) = CredentialRecord::load(store.as_ref(), key) {
                    if record.expires_at_ms != initial_expires_at_ms {
                        return Some(record);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "waiter_tests.rs"]
mod tests;
