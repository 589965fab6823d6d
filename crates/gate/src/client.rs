// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound request interceptor.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;

use crate::gate::RequestGate;

/// HTTP client wrapper that routes every outbound call through the request
/// gate and attaches the resolved bearer credential.
///
/// The refresh call itself never passes through here — [`HttpRefresher`]
/// talks to the token endpoint directly, outside the gate.
///
/// [`HttpRefresher`]: crate::refresh::HttpRefresher
pub struct ApiClient {
    base_url: String,
    gate: Arc<RequestGate>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String, gate: Arc<RequestGate>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { base_url, gate, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request with the current credential attached.
    ///
    /// A caller without a resolvable credential proceeds unauthenticated and
    /// lets the backend's normal 401 handling decide.
    pub async fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match self.gate.get_credential().await {
            Some(record) => req.bearer_auth(record.access_token),
            None => req,
        }
    }

    /// GET a JSON resource.
    pub async fn get_json(&self, path: &str) -> anyhow::Result<serde_json::Value> {
        let resp = self.request(Method::GET, path).await.send().await?;
        let value = resp.error_for_status()?.json().await?;
        Ok(value)
    }

    /// POST a JSON body and parse the JSON response.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let resp = self.request(Method::POST, path).await.json(body).send().await?;
        let value = resp.error_for_status()?.json().await?;
        Ok(value)
    }
}
