// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: mock refreshers and config builders.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::config::GateConfig;
use crate::record::{CredentialRecord, TokenResponse};
use crate::refresh::TokenRefresher;

/// Config with a dummy endpoint and production timings.
pub fn test_config() -> GateConfig {
    GateConfig {
        token_url: "http://localhost/oauth2/token".to_owned(),
        client_id: "test-client".to_owned(),
        client_secret: "test-secret".to_owned(),
        ..GateConfig::default()
    }
}

/// Config with timings shrunk for wall-clock tests.
pub fn fast_config() -> GateConfig {
    GateConfig {
        max_wait_ms: 1_500,
        poll_interval_ms: 50,
        failure_debounce_ms: 100,
        jitter_min_ms: 1,
        jitter_max_ms: 5,
        ..test_config()
    }
}

/// A credential that expired one second ago.
pub fn expired_record(now_ms: u64) -> CredentialRecord {
    CredentialRecord {
        access_token: "access-0".to_owned(),
        refresh_token: "refresh-0".to_owned(),
        expires_at_ms: now_ms.saturating_sub(1_000),
    }
}

/// Refresher double: returns sequential tokens and counts calls. Can be made
/// slow (to hold a cycle open while callers pile up) or failing.
pub struct MockRefresher {
    calls: AtomicU32,
    delay: Duration,
    fail: bool,
}

impl Default for MockRefresher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRefresher {
    pub fn new() -> Self {
        Self { calls: AtomicU32::new(0), delay: Duration::ZERO, fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::new() }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(&self, _current: &CredentialRecord) -> anyhow::Result<TokenResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("token endpoint unavailable");
        }
        Ok(TokenResponse {
            access_token: format!("access-{n}"),
            refresh_token: Some(format!("refresh-{n}")),
            expires_in: 3600,
            token_type: Some("Bearer".to_owned()),
        })
    }
}
