// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-demand LAN host scan and stale-device janitor (spec.md §4.7).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

use crate::model::{DiscoveredHost, DiscoveryMethod};
use crate::state::ServerState;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const MAX_CONCURRENT_PROBES: usize = 50;
const DEEP_SCAN_PORTS: [u16; 4] = [22, 80, 443, 8080];

/// Scan depth requested by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDepth {
    Basic,
    Deep,
}

/// Sweep every host address on `base`'s own `/24`, recording reachable
/// addresses as [`DiscoveredHost`]s. Batches to at most
/// [`MAX_CONCURRENT_PROBES`] concurrent probes.
pub async fn scan_subnet(state: &Arc<ServerState>, base: Ipv4Addr, depth: ScanDepth) {
    let octets = base.octets();
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
    let mut tasks = Vec::with_capacity(254);

    for host in 1u8..=254 {
        if host == octets[3] {
            continue;
        }
        let addr = Ipv4Addr::new(octets[0], octets[1], octets[2], host);
        let state = Arc::clone(state);
        let semaphore = Arc::clone(&semaphore);
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            probe_host(&state, IpAddr::V4(addr), depth).await;
        }));
    }

    for task in tasks {
        let _ = task.await;
    }
}

async fn probe_host(state: &Arc<ServerState>, ip: IpAddr, depth: ScanDepth) {
    if ping(ip).await {
        record(state, ip, DiscoveryMethod::Ping, true).await;
        return;
    }

    if depth == ScanDepth::Deep {
        for port in DEEP_SCAN_PORTS {
            if tcp_connect(ip, port).await {
                record(state, ip, DiscoveryMethod::TcpProbe, true).await;
                return;
            }
        }
    }
}

async fn record(state: &Arc<ServerState>, ip: IpAddr, method: DiscoveryMethod, is_likely_candidate: bool) {
    let now = Utc::now();
    state
        .discovery
        .upsert(DiscoveredHost {
            ip_address: ip,
            hostname: None,
            first_seen_at: now,
            last_seen_at: now,
            discovery_method: method,
            is_likely_candidate,
        })
        .await;
}

async fn tcp_connect(ip: IpAddr, port: u16) -> bool {
    let addr = SocketAddr::new(ip, port);
    matches!(tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Send a raw ICMPv4 echo request and wait up to [`PROBE_TIMEOUT`] for a reply.
///
/// The pack carries no dedicated ICMP crate, so this builds the echo packet
/// directly over a `socket2` raw socket (already a dependency for
/// multicast discovery). Raw sockets require elevated privileges; a
/// permission failure here is logged once and treated as "unreachable",
/// not a scan error.
async fn ping(ip: IpAddr) -> bool {
    let IpAddr::V4(target) = ip else { return false };
    tokio::task::spawn_blocking(move || ping_blocking(target)).await.unwrap_or(false)
}

fn ping_blocking(target: Ipv4Addr) -> bool {
    let socket = match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(err = %e, "discovery: raw ICMP socket unavailable (requires elevated privileges)");
            return false;
        }
    };
    if socket.set_read_timeout(Some(PROBE_TIMEOUT)).is_err() {
        return false;
    }

    let packet = build_echo_request(std::process::id() as u16, 1);
    let dest = SocketAddr::new(IpAddr::V4(target), 0);
    if socket.send_to(&packet, &dest.into()).is_err() {
        return false;
    }

    let mut buf = [std::mem::MaybeUninit::new(0u8); 512];
    socket.recv(&mut buf).is_ok()
}

/// Build a minimal ICMPv4 echo request (type 8, code 0) with a computed checksum.
fn build_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 16];
    packet[0] = 8; // type: echo request
    packet[1] = 0; // code
    packet[4..6].copy_from_slice(&identifier.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    let checksum = icmp_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

fn icmp_checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Spawn the background janitor that ages out stale discovered hosts.
pub fn spawn_janitor(state: Arc<ServerState>) {
    tokio::spawn(async move {
        let threshold = state.config.discovery_stale_threshold();
        let mut timer = tokio::time::interval(Duration::from_secs(60));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::minutes(30));
            state.discovery.evict_stale(Utc::now(), threshold).await;
        }
    });
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
