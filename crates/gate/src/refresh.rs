// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor role: the lock holder's network refresh and its fallbacks.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::GateConfig;
use crate::gate::GateEvent;
use crate::lock::ContextLock;
use crate::record::{epoch_ms, CredentialRecord, TokenResponse};
use crate::store::KvStore;

/// Performs the actual token refresh against the provider.
///
/// Injected into the gate so tests can stand in for the network.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, current: &CredentialRecord) -> anyhow::Result<TokenResponse>;
}

/// Production refresher: form-encoded refresh grant against the token
/// endpoint, with the current access token forwarded as a bearer header.
pub struct HttpRefresher {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HttpRefresher {
    pub fn new(config: &GateConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_default();
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpRefresher {
    async fn refresh(&self, current: &CredentialRecord) -> anyhow::Result<TokenResponse> {
        let resp = self
            .http
            .post(&self.token_url)
            .bearer_auth(&current.access_token)
            .form(&[
                ("refresh_token", current.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("refresh failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}

/// Run the lock holder's refresh. Always yields a credential record: the
/// fresh one on success, another context's on a lost race, or the original
/// with a short cool-down extension when the endpoint is unreachable — so
/// outbound calls are never blocked indefinitely on a failing refresh.
pub(crate) async fn run_executor(
    store: &Arc<dyn KvStore>,
    lock: &ContextLock,
    refresher: &Arc<dyn TokenRefresher>,
    config: &GateConfig,
    events: &broadcast::Sender<GateEvent>,
    current: CredentialRecord,
) -> CredentialRecord {
    match refresher.refresh(&current).await {
        Ok(token) => {
            let record = CredentialRecord {
                access_token: token.access_token,
                refresh_token: token.refresh_token.unwrap_or(current.refresh_token),
                expires_at_ms: epoch_ms() + config.token_lifetime_ms,
            };
            record.save(store.as_ref(), &config.token_key);
            lock.release();
            tracing::info!("credential refreshed");
            let _ = events.send(GateEvent::Refreshed { record: record.clone() });
            record
        }
        Err(e) => {
            tracing::warn!(err = %e, "credential refresh failed");
            lock.release();
            // Debounce before deciding the fallback, so contexts racing into
            // the same failure don't retry in lockstep.
            tokio::time::sleep(config.failure_debounce()).await;

            let now = epoch_ms();
            if let Some(other) = CredentialRecord::load(store.as_ref(), &config.token_key) {
                if !other.is_expired(now) {
                    tracing::debug!("another context refreshed during the debounce");
                    let _ = events.send(GateEvent::RefreshFailed { error: e.to_string() });
                    return other;
                }
            }

            // Short cool-down on the old record: callers keep a token the
            // backend may still accept, and nobody re-attempts immediately.
            let patched =
                CredentialRecord { expires_at_ms: now + config.cooldown_extension_ms, ..current };
            patched.save(store.as_ref(), &config.token_key);
            let _ = events.send(GateEvent::RefreshFailed { error: e.to_string() });
            patched
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
