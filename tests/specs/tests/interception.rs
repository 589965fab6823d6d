// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end interception: outbound API calls routed through the gate
//! against live mock endpoints.

use std::sync::Arc;

use tokengate::{ApiClient, GateConfig, HttpRefresher, KvStore, MemoryStore, RequestGate};
use tokengate_specs::{expired_record, gate_config, valid_record, ApiServer, TokenServer};

fn client_for(store: Arc<dyn KvStore>, config: &GateConfig, base_url: String) -> ApiClient {
    let refresher = Arc::new(HttpRefresher::new(config));
    let gate = RequestGate::new(store, refresher, config.clone(), "tab-api");
    ApiClient::new(base_url, gate)
}

#[tokio::test]
async fn bearer_is_attached_from_the_cache() -> anyhow::Result<()> {
    let api = ApiServer::spawn().await?;
    let config = gate_config("http://127.0.0.1:9/oauth2/token");

    let root = Arc::new(MemoryStore::new("root"));
    let store: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));
    valid_record().save(store.as_ref(), &config.token_key);

    let client = client_for(store, &config, api.base_url());
    let body = client.get_json("/resource").await?;

    assert_eq!(body["ok"], true);
    assert_eq!(
        api.authorizations(),
        vec![Some("Bearer access-valid".to_owned())]
    );
    Ok(())
}

#[tokio::test]
async fn missing_credential_proceeds_unauthenticated() -> anyhow::Result<()> {
    let api = ApiServer::spawn().await?;
    let config = gate_config("http://127.0.0.1:9/oauth2/token");

    let root = Arc::new(MemoryStore::new("root"));
    let store: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));

    let client = client_for(store, &config, api.base_url());
    let body = client.get_json("/resource").await?;

    assert_eq!(body["ok"], true);
    assert_eq!(api.authorizations(), vec![None]);
    Ok(())
}

#[tokio::test]
async fn expired_credential_is_refreshed_before_the_call() -> anyhow::Result<()> {
    let api = ApiServer::spawn().await?;
    let token_server = TokenServer::spawn().await?;
    let config = gate_config(&token_server.url());

    let root = Arc::new(MemoryStore::new("root"));
    let store: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));
    expired_record().save(store.as_ref(), &config.token_key);

    let client = client_for(store, &config, api.base_url());
    let body = client.get_json("/resource").await?;

    assert_eq!(body["ok"], true);
    assert_eq!(token_server.calls(), 1);
    assert_eq!(
        api.authorizations(),
        vec![Some("Bearer access-e2e-1".to_owned())]
    );
    Ok(())
}
