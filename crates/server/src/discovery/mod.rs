// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery (spec.md §4.7): multicast service advertisement, link-local
//! broadcast responder, and on-demand LAN host scanning. Three independent
//! mechanisms that share only the `DiscoveredHost` cache; advertisement is
//! a publisher, the broadcast responder is a reactor, the scan is a
//! pull-query with its own janitor (spec.md §9).

pub mod advertise;
pub mod broadcast;
pub mod scan;

use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::DiscoveredHost;

/// Shared discovery state: the LAN-scan findings cache.
#[derive(Default)]
pub struct DiscoveryState {
    hosts: RwLock<HashMap<IpAddr, DiscoveredHost>>,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, host: DiscoveredHost) {
        let mut hosts = self.hosts.write().await;
        match hosts.get_mut(&host.ip_address) {
            Some(existing) => {
                existing.last_seen_at = host.last_seen_at;
                existing.hostname = host.hostname.or(existing.hostname.take());
                existing.discovery_method = host.discovery_method;
                existing.is_likely_candidate = host.is_likely_candidate;
            }
            None => {
                hosts.insert(host.ip_address, host);
            }
        }
    }

    /// All known hosts, ordered by subnet-class priority (spec.md §4.7).
    pub async fn list_ranked(&self) -> Vec<DiscoveredHost> {
        let mut hosts: Vec<DiscoveredHost> = self.hosts.read().await.values().cloned().collect();
        hosts.sort_by_key(|h| subnet_rank(h.ip_address));
        hosts
    }

    /// Remove hosts not seen within `threshold` of `now` (the stale-device janitor).
    pub async fn evict_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) {
        self.hosts.write().await.retain(|_, host| now - host.last_seen_at <= threshold);
    }
}

/// Ordering key for IP prioritization: lower is preferred.
/// `192.168.*` > `10.*` > `172.{16..31}.*` > other private > public.
/// Loopback, link-local, and unspecified addresses are filtered out entirely
/// by [`is_reportable`] before this is ever consulted.
pub(crate) fn subnet_rank(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            if o[0] == 192 && o[1] == 168 {
                0
            } else if o[0] == 10 {
                1
            } else if o[0] == 172 && (16..=31).contains(&o[1]) {
                2
            } else if v4.is_private() {
                3
            } else {
                4
            }
        }
        IpAddr::V6(_) => 4,
    }
}

/// Loopback, link-local (`169.254.*`), and unspecified addresses are never
/// reported (spec.md §4.7).
pub fn is_reportable(ip: IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return false;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local(),
        IpAddr::V6(v6) => !(v6.segments()[0] & 0xffc0 == 0xfe80),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
