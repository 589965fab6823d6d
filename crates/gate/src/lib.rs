// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokengate: cross-context OAuth token refresh coordination.
//!
//! Any number of contexts (processes, tasks — the native analog of browser
//! tabs) share one persisted credential store. At most one of them performs
//! the network refresh at a time; the rest observe the result through the
//! store's change notifications or a polling fallback, and concurrent demand
//! within one context collapses into a single refresh-or-wait cycle.

pub mod client;
pub mod config;
pub mod gate;
pub mod lock;
pub mod record;
pub mod refresh;
pub mod store;
pub mod test_support;
pub mod waiter;

pub use client::ApiClient;
pub use config::GateConfig;
pub use gate::{GateEvent, RequestGate};
pub use record::{CredentialRecord, LockRecord, TokenResponse};
pub use refresh::{HttpRefresher, TokenRefresher};
pub use store::file::FileStore;
pub use store::memory::MemoryStore;
pub use store::{KvStore, StoreChange};
