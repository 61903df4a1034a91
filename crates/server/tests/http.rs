// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the control-plane HTTP surface.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use signage_mux::config::ServerConfig;
use signage_mux::repository::mem::InMemoryStore;
use signage_mux::state::ServerState;
use signage_mux::transport::build_router;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        alternative_ports: Vec::new(),
        auto_select_port: true,
        enable_ssl: true,
        certificate_path: None,
        certificate_key_path: None,
        endpoint_path: "/ws/".to_owned(),
        max_message_size: 1024 * 1024,
        client_heartbeat_timeout_secs: 90,
        scheduler_tick_interval_secs: 60,
        liveness_check_interval_secs: 30,
        discovery_port: 5556,
        connection_string: None,
        preferred_network_interface: None,
        screenshot_timeout_secs: 30,
        discovery_stale_minutes: 30,
        send_queue_capacity: 256,
        protocol_error_threshold: 5,
    }
}

fn test_state() -> Arc<ServerState> {
    let repository = Arc::new(InMemoryStore::new()).into_repository();
    ServerState::new(test_config(), repository, CancellationToken::new())
}

#[tokio::test]
async fn healthz_returns_ok() -> anyhow::Result<()> {
    let state = test_state();
    let server = axum_test::TestServer::new(build_router(state))?;

    let resp = server.get("/healthz").await;
    resp.assert_status_ok();
    assert_eq!(resp.text(), "ok");
    Ok(())
}
