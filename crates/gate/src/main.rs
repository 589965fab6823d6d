// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::error;

use tokengate::record::{epoch_ms, CredentialRecord, LockRecord};
use tokengate::{FileStore, GateConfig, HttpRefresher, KvStore, RequestGate};

#[derive(Parser)]
#[command(name = "tokengate", about = "Inspect and drive a shared credential store")]
struct Cli {
    /// Directory holding the shared store files.
    #[arg(long, env = "TOKENGATE_STATE_DIR", default_value = ".tokengate")]
    state_dir: PathBuf,

    /// Path to gate configuration JSON.
    #[arg(long, env = "TOKENGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the stored credential and lock state.
    Status,
    /// Run one gate pass, refreshing through the configured endpoint if the
    /// stored credential is expired.
    Refresh,
    /// Stream store change events from other processes.
    Watch,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // reqwest is built with rustls-no-provider; pick ring explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::default(),
    };
    let store: Arc<dyn KvStore> = Arc::new(FileStore::open(&cli.state_dir)?);

    match cli.command {
        Command::Status => {
            let now = epoch_ms();
            match CredentialRecord::load(store.as_ref(), &config.token_key) {
                Some(r) if r.is_expired(now) => {
                    println!("credential: expired {}s ago", (now - r.expires_at_ms) / 1000);
                }
                Some(r) => {
                    println!("credential: valid for {}s", (r.expires_at_ms - now) / 1000);
                }
                None => println!("credential: absent"),
            }
            match LockRecord::load(store.as_ref(), &config.lock_key) {
                Some(l) if l.is_stale(now, config.lock_timeout_ms) => {
                    println!("lock: stale (last holder {})", l.holder);
                }
                Some(l) => {
                    println!("lock: held by {} for {}s", l.holder, (now - l.acquired_at_ms) / 1000);
                }
                None => println!("lock: free"),
            }
        }
        Command::Refresh => {
            anyhow::ensure!(
                !config.token_url.is_empty(),
                "refresh requires a config file with token_url set"
            );
            let refresher = Arc::new(HttpRefresher::new(&config));
            let context_id = format!("cli-{}", uuid::Uuid::new_v4());
            let gate = RequestGate::new(store, refresher, config, context_id);
            match gate.get_credential().await {
                Some(record) => {
                    let now = epoch_ms();
                    let left = record.expires_at_ms.saturating_sub(now) / 1000;
                    println!("credential resolved, valid for {left}s");
                }
                None => println!("no credential stored; seed one through the login flow first"),
            }
        }
        Command::Watch => {
            let mut rx = store.subscribe();
            println!("watching {} (ctrl-c to stop)", cli.state_dir.display());
            loop {
                match rx.recv().await {
                    Ok(change) => {
                        println!("{}: {}", change.key, change.value.as_deref().unwrap_or("<removed>"));
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}
