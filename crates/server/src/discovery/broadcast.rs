// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Link-local broadcast discovery responder (spec.md §4.7, §6).

use std::sync::Arc;

use serde::Serialize;
use tokio::net::UdpSocket;

use crate::discovery::is_reportable;
use crate::state::ServerState;

const PROBE_PAYLOAD: &str = "DIGITALSIGNAGE_DISCOVER_CLIENT";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryReply {
    server_name: String,
    port: u16,
    ssl: bool,
    local_ips: Vec<String>,
}

/// Spawn the background task that answers broadcast discovery probes.
pub fn spawn_broadcast_responder(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let bind_addr = format!("0.0.0.0:{}", state.config.discovery_port);
        let socket = match UdpSocket::bind(&bind_addr).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(err = %e, addr = %bind_addr, "discovery: failed to bind broadcast responder");
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            tracing::warn!(err = %e, "discovery: failed to enable broadcast on responder socket");
        }

        let mut buf = [0u8; 256];
        loop {
            let recv = tokio::select! {
                _ = state.shutdown.cancelled() => break,
                result = socket.recv_from(&mut buf) => result,
            };
            let (len, peer) = match recv {
                Ok(v) => v,
                Err(e) => {
                    tracing::debug!(err = %e, "discovery: broadcast recv error");
                    continue;
                }
            };
            if &buf[..len] != PROBE_PAYLOAD.as_bytes() {
                continue;
            }

            let reply = DiscoveryReply {
                server_name: hostname(),
                port: state.config.port,
                ssl: state.config.enable_ssl,
                local_ips: local_ips(),
            };
            match serde_json::to_vec(&reply) {
                Ok(json) => {
                    if let Err(e) = socket.send_to(&json, peer).await {
                        tracing::debug!(err = %e, peer = %peer, "discovery: broadcast reply send failed");
                    }
                }
                Err(e) => tracing::warn!(err = %e, "discovery: failed to serialize broadcast reply"),
            }
        }
    });
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "signage-server".to_owned())
}

/// This host's own reportable local addresses, ranked per spec.md §4.7.
fn local_ips() -> Vec<String> {
    let Ok(ifaces) = if_addrs::get_if_addrs() else { return Vec::new() };
    let mut ips: Vec<std::net::IpAddr> =
        ifaces.into_iter().map(|i| i.ip()).filter(|ip| is_reportable(*ip)).collect();
    ips.sort_by_key(|ip| crate::discovery::subnet_rank(*ip));
    ips.into_iter().map(|ip| ip.to_string()).collect()
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
