// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the request gate and its collaborators.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Gate configuration, loaded from JSON or built in code.
///
/// Timing fields default to the production constants; tests shrink them
/// through struct-update syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// OAuth token endpoint for the refresh grant.
    #[serde(default)]
    pub token_url: String,
    /// OAuth client ID sent with the refresh grant.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret sent with the refresh grant.
    #[serde(default)]
    pub client_secret: String,

    /// Store key holding the credential record.
    #[serde(default = "default_token_key")]
    pub token_key: String,
    /// Store key holding the lock record.
    #[serde(default = "default_lock_key")]
    pub lock_key: String,

    /// Lock records older than this are treated as absent.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Ceiling on a non-holder's wait for another context's refresh.
    /// Longer than `lock_timeout_ms` so a dead holder's lock can go stale
    /// and be taken over before the waiter gives up.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Poll fallback interval while waiting.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause after a failed refresh before deciding the fallback.
    #[serde(default = "default_failure_debounce_ms")]
    pub failure_debounce_ms: u64,
    /// Expiry extension applied to the old record after a failed refresh.
    #[serde(default = "default_cooldown_extension_ms")]
    pub cooldown_extension_ms: u64,
    /// Client-side lifetime of a freshly refreshed credential.
    #[serde(default = "default_token_lifetime_ms")]
    pub token_lifetime_ms: u64,
    /// Network timeout for the refresh call.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Maximum executor-or-waiter attempts per gate cycle.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Bounds of the random delay before a lock acquisition read.
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

fn default_token_key() -> String {
    "token_cache".to_owned()
}

fn default_lock_key() -> String {
    "token_refresh_lock".to_owned()
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_max_wait_ms() -> u64 {
    35_000
}

fn default_poll_interval_ms() -> u64 {
    200
}

fn default_failure_debounce_ms() -> u64 {
    1_000
}

fn default_cooldown_extension_ms() -> u64 {
    60_000
}

fn default_token_lifetime_ms() -> u64 {
    3_600_000
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_jitter_min_ms() -> u64 {
    5
}

fn default_jitter_max_ms() -> u64 {
    100
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            token_key: default_token_key(),
            lock_key: default_lock_key(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_wait_ms: default_max_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            failure_debounce_ms: default_failure_debounce_ms(),
            cooldown_extension_ms: default_cooldown_extension_ms(),
            token_lifetime_ms: default_token_lifetime_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            max_attempts: default_max_attempts(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn failure_debounce(&self) -> Duration {
        Duration::from_millis(self.failure_debounce_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
