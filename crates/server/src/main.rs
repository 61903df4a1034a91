// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tracing::error;

use signage_mux::config::ServerConfig;
use signage_mux::repository::mem::InMemoryStore;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut store = InMemoryStore::new();
    if let Some(ref connection_string) = config.connection_string {
        store = store.with_persistence(std::path::PathBuf::from(connection_string));
        if let Err(e) = store.load_persisted().await {
            error!("failed to load persisted repository snapshot: {e:#}");
        }
    }
    let repository = Arc::new(store).into_repository();

    if let Err(e) = signage_mux::run(config, repository).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
