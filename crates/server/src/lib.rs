// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Digital-signage fleet controller: the secure bidirectional control
//! plane that registers Clients, tracks their liveness, dispatches
//! operator commands, resolves and pushes layouts on a schedule, and
//! advertises itself on the local network.

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod liveness;
pub mod model;
pub mod repository;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod tokens;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::repository::Repository;
use crate::state::ServerState;

/// Run the fleet controller until shutdown (Ctrl-C or an externally
/// cancelled token). Binds `config.port`, falling back through
/// `config.alternative_ports` when `autoSelectPort` is set.
pub async fn run(config: ServerConfig, repository: Repository) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = ServerState::new(config.clone(), repository, shutdown.clone());

    let tls_config = transport::tls::load_rustls_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS configuration: {e}"))?;

    let bind_addr = resolve_bind_addr(&config)?;

    state::spawn_fleet_event_broadcaster(Arc::clone(&state));
    liveness::spawn_liveness_monitor(Arc::clone(&state));
    scheduler::spawn_scheduler(Arc::clone(&state));
    discovery::advertise::spawn_advertiser(Arc::clone(&state));
    discovery::broadcast::spawn_broadcast_responder(Arc::clone(&state));
    discovery::scan::spawn_janitor(Arc::clone(&state));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let router = transport::build_router(Arc::clone(&state))
        .into_make_service_with_connect_info::<SocketAddr>();

    let handle = axum_server::Handle::new();
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });
    }

    tracing::info!(addr = %bind_addr, endpoint = %state.config.endpoint_path, "signage control plane listening");
    axum_server::bind_rustls(bind_addr, tls_config).handle(handle).serve(router).await?;

    Ok(())
}

/// Probe `config.port`, then (if `autoSelectPort`) each of
/// `alternativePorts` in order, returning the first that is free.
fn resolve_bind_addr(config: &ServerConfig) -> anyhow::Result<SocketAddr> {
    let mut candidates = vec![config.port];
    if config.auto_select_port {
        candidates.extend(config.alternative_ports.iter().copied());
    }

    let mut last_err = None;
    for port in candidates {
        match try_bind(&config.host, port) {
            Ok(addr) => return Ok(addr),
            Err(e) => last_err = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "no usable port among {:?}: {}",
        std::iter::once(config.port).chain(config.alternative_ports.iter().copied()).collect::<Vec<_>>(),
        last_err.map(|e| e.to_string()).unwrap_or_else(|| "no candidates".to_owned())
    ))
}

fn try_bind(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let listener = std::net::TcpListener::bind((host, port))?;
    listener.local_addr()
}
