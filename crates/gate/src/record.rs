// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types stored in the shared store and returned by the token endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::store::KvStore;

/// The persisted credential: access/refresh token pair plus a
/// client-computed absolute expiry.
///
/// Serialized under the historical wire names — `expires_in` carries an
/// absolute epoch-ms expiry, not a duration. Mutated only as a whole-record
/// replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as milliseconds since Unix epoch.
    #[serde(rename = "expires_in")]
    pub expires_at_ms: u64,
}

impl CredentialRecord {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Read and parse the credential under `key`. Malformed or missing data
    /// degrades to `None`: the caller proceeds unauthenticated and the
    /// backend stays the authority on rejecting bad tokens.
    pub fn load(store: &dyn KvStore, key: &str) -> Option<Self> {
        let raw = store.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, err = %e, "malformed credential record, treating as absent");
                None
            }
        }
    }

    /// Parse a serialized record, e.g. from a change-notification payload.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn save(&self, store: &dyn KvStore, key: &str) {
        match serde_json::to_string(self) {
            Ok(json) => store.write(key, &json),
            Err(e) => tracing::warn!(key, err = %e, "failed to serialize credential record"),
        }
    }
}

/// Advisory mutual-exclusion marker: holder identity + acquisition time.
///
/// Serialized under the historical wire names (`tabId`, `timestamp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    #[serde(rename = "tabId")]
    pub holder: String,
    /// Acquisition time as milliseconds since Unix epoch.
    #[serde(rename = "timestamp")]
    pub acquired_at_ms: u64,
}

impl LockRecord {
    /// A lock older than the timeout is treated as absent by acquirers, so
    /// a holder that died mid-refresh cannot wedge the protocol.
    pub fn is_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.acquired_at_ms) > timeout_ms
    }

    pub fn load(store: &dyn KvStore, key: &str) -> Option<Self> {
        let raw = store.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, err = %e, "malformed lock record, treating as absent");
                None
            }
        }
    }

    pub fn save(&self, store: &dyn KvStore, key: &str) {
        match serde_json::to_string(self) {
            Ok(json) => store.write(key, &json),
            Err(e) => tracing::warn!(key, err = %e, "failed to serialize lock record"),
        }
    }
}

/// Standard OAuth2 token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Server-declared lifetime in seconds. Parsed for wire compatibility;
    /// the stored expiry is always computed client-side.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Current wall-clock time as milliseconds since Unix epoch.
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
