// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end coordination scenarios: multiple gate contexts over a shared
//! store, refreshing against a live mock token endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokengate::record::epoch_ms;
use tokengate::{
    CredentialRecord, GateConfig, HttpRefresher, KvStore, MemoryStore, RequestGate,
};
use tokengate_specs::{expired_record, gate_config, TokenServer};

fn gate_for(
    store: Arc<dyn KvStore>,
    config: &GateConfig,
    context_id: &str,
) -> Arc<RequestGate> {
    let refresher = Arc::new(HttpRefresher::new(config));
    RequestGate::new(store, refresher, config.clone(), context_id)
}

#[tokio::test]
async fn contending_context_adopts_the_holders_refresh() -> anyhow::Result<()> {
    // The grant takes 300ms, so the second context finds the lock held and
    // has to wait for the first one's result.
    let server = TokenServer::spawn_with_delay(Duration::from_millis(300)).await?;
    let config = gate_config(&server.url());

    let root = Arc::new(MemoryStore::new("root"));
    let store_a: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));
    let store_b: Arc<dyn KvStore> = Arc::new(root.context("ctx-b"));
    expired_record().save(store_a.as_ref(), &config.token_key);

    let gate_a = gate_for(store_a, &config, "tab-a");
    let gate_b = gate_for(store_b, &config, "tab-b");

    let first = tokio::spawn({
        let gate_a = Arc::clone(&gate_a);
        async move { gate_a.get_credential().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = gate_b.get_credential().await;

    let first = first.await?.ok_or_else(|| anyhow::anyhow!("first context got nothing"))?;
    let second = second.ok_or_else(|| anyhow::anyhow!("second context got nothing"))?;

    assert_eq!(server.calls(), 1);
    assert_eq!(first.access_token, "access-e2e-1");
    assert_eq!(second.access_token, first.access_token);
    Ok(())
}

#[tokio::test]
async fn simultaneous_contexts_both_resolve() -> anyhow::Result<()> {
    // With identical jitter both contexts may slip past each other's lock
    // write. That race is accepted: the requirement is that neither caller
    // errors and the store ends up with a usable credential.
    let server = TokenServer::spawn().await?;
    let mut config = gate_config(&server.url());
    config.jitter_min_ms = 1;
    config.jitter_max_ms = 1;

    let root = Arc::new(MemoryStore::new("root"));
    let store_a: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));
    let store_b: Arc<dyn KvStore> = Arc::new(root.context("ctx-b"));
    expired_record().save(store_a.as_ref(), &config.token_key);

    let gate_a = gate_for(store_a, &config, "tab-a");
    let gate_b = gate_for(store_b, &config, "tab-b");

    let (a, b) = tokio::join!(gate_a.get_credential(), gate_b.get_credential());
    let a = a.ok_or_else(|| anyhow::anyhow!("context a got nothing"))?;
    let b = b.ok_or_else(|| anyhow::anyhow!("context b got nothing"))?;

    let now = epoch_ms();
    assert!(!a.is_expired(now));
    assert!(!b.is_expired(now));
    assert!((1..=2).contains(&server.calls()), "calls: {}", server.calls());

    let stored = CredentialRecord::load(root.as_ref(), &config.token_key)
        .ok_or_else(|| anyhow::anyhow!("no stored credential"))?;
    assert!(!stored.is_expired(now));
    Ok(())
}

#[tokio::test]
async fn many_local_callers_cost_one_grant() -> anyhow::Result<()> {
    let server = TokenServer::spawn_with_delay(Duration::from_millis(200)).await?;
    let config = gate_config(&server.url());

    let root = Arc::new(MemoryStore::new("root"));
    let store: Arc<dyn KvStore> = Arc::new(root.context("ctx-a"));
    expired_record().save(store.as_ref(), &config.token_key);

    let gate = gate_for(store, &config, "tab-a");

    let mut callers = Vec::new();
    for _ in 0..3 {
        let gate = Arc::clone(&gate);
        callers.push(tokio::spawn(async move { gate.get_credential().await }));
    }

    for caller in callers {
        let record = caller.await?.ok_or_else(|| anyhow::anyhow!("caller got nothing"))?;
        assert_eq!(record.access_token, "access-e2e-1");
    }
    assert_eq!(server.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn file_backed_contexts_coordinate() -> anyhow::Result<()> {
    use tokengate::FileStore;

    let server = TokenServer::spawn_with_delay(Duration::from_millis(300)).await?;
    let config = gate_config(&server.url());

    let dir = tempfile::tempdir()?;
    let store_a: Arc<dyn KvStore> = Arc::new(FileStore::open(dir.path())?);
    let store_b: Arc<dyn KvStore> = Arc::new(FileStore::open(dir.path())?);
    expired_record().save(store_a.as_ref(), &config.token_key);

    let gate_a = gate_for(store_a, &config, "tab-a");
    let gate_b = gate_for(Arc::clone(&store_b), &config, "tab-b");

    let first = tokio::spawn({
        let gate_a = Arc::clone(&gate_a);
        async move { gate_a.get_credential().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = gate_b.get_credential().await;

    let first = first.await?.ok_or_else(|| anyhow::anyhow!("first context got nothing"))?;
    let second = second.ok_or_else(|| anyhow::anyhow!("second context got nothing"))?;

    assert_eq!(server.calls(), 1);
    assert_eq!(first.access_token, second.access_token);

    // The refreshed record survives on disk for a later process.
    let reopened = FileStore::open(dir.path())?;
    let stored = CredentialRecord::load(&reopened, &config.token_key)
        .ok_or_else(|| anyhow::anyhow!("no stored credential"))?;
    assert_eq!(stored.access_token, first.access_token);
    Ok(())
}
