// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-network service advertisement (spec.md §4.7).
//!
//! Publishes a `_digitalsignage._tcp` service record over a multicast
//! group and answers queries from operator devices browsing for it. The
//! pack carries no mDNS/DNS-SD codec crate, so the on-wire record here is a
//! JSON datagram rather than a binary DNS-SD message; the advertised
//! fields (`version`, `ssl`, `clients`) and semantics match spec.md exactly.
//! Multicast group membership uses `socket2`, grounded on
//! `examples/other_examples/bd965160_LocalRouter-LocalRouter__src-tauri-src-server-state.rs.rs`.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};

use crate::state::ServerState;

/// Well-known multicast group used for the `_digitalsignage._tcp` record,
/// shared with the mDNS group so the same network ACLs already admit it.
const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MULTICAST_PORT: u16 = 5353;
const SERVICE_TYPE: &str = "_digitalsignage._tcp";

#[derive(Debug, Clone, Serialize)]
struct ServiceRecord {
    service: &'static str,
    instance: String,
    port: u16,
    version: &'static str,
    ssl: bool,
    clients: usize,
}

fn build_multicast_socket() -> std::io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MULTICAST_PORT);
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&MULTICAST_GROUP, &Ipv4Addr::UNSPECIFIED)?;
    Ok(socket)
}

/// Spawn the background advertiser: periodically announces the service
/// record, and answers any datagram received on the multicast group with
/// the same record (queries are not otherwise parsed).
pub fn spawn_advertiser(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let socket = match build_multicast_socket() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(err = %e, "discovery: failed to open multicast socket, advertisement disabled");
                return;
            }
        };
        let socket = match tokio::net::UdpSocket::from_std(socket.into()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(err = %e, "discovery: failed to adopt multicast socket into tokio runtime");
                return;
            }
        };

        let dest = SocketAddr::from((MULTICAST_GROUP, MULTICAST_PORT));
        let mut announce_interval = tokio::time::interval(std::time::Duration::from_secs(30));
        announce_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut recv_buf = [0u8; 512];

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = announce_interval.tick() => {
                    announce(&socket, &state, dest).await;
                }
                result = socket.recv_from(&mut recv_buf) => {
                    if result.is_ok() {
                        // Any inbound datagram on the group is treated as a browse query.
                        announce(&socket, &state, dest).await;
                    }
                }
            }
        }
    });
}

async fn announce(socket: &tokio::net::UdpSocket, state: &Arc<ServerState>, dest: SocketAddr) {
    let record = ServiceRecord {
        service: SERVICE_TYPE,
        instance: hostname(),
        port: state.config.port,
        version: env!("CARGO_PKG_VERSION"),
        ssl: state.config.enable_ssl,
        clients: state.sessions.client_session_count().await,
    };
    let Ok(json) = serde_json::to_vec(&record) else { return };
    if let Err(e) = socket.send_to(&json, dest).await {
        tracing::debug!(err = %e, "discovery: multicast announce send failed");
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "signage-server".to_owned())
}

#[cfg(test)]
#[path = "advertise_tests.rs"]
mod tests;
