// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::dispatch::PendingScreenshots;
use crate::discovery::DiscoveryState;
use crate::envelope::{ClientInfo, ClientListUpdate, Envelope};
use crate::model::ClientStatus;
use crate::repository::Repository;
use crate::scheduler::SchedulerCache;
use crate::session::SessionRegistry;

/// Fleet-wide events broadcast to subscribed operator connections.
#[derive(Debug, Clone)]
pub enum FleetEvent {
    ClientStatusChanged { client_id: String, status: ClientStatus },
}

/// Shared server state, handed to every handler and background task.
pub struct ServerState {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub repository: Repository,
    pub shutdown: CancellationToken,
    pub pending_screenshots: PendingScreenshots,
    pub scheduler_cache: SchedulerCache,
    pub discovery: DiscoveryState,
    pub fleet_events: broadcast::Sender<FleetEvent>,
}

impl ServerState {
    pub fn new(config: ServerConfig, repository: Repository, shutdown: CancellationToken) -> Arc<Self> {
        let (fleet_events, _) = broadcast::channel(256);
        Arc::new(Self {
            config,
            sessions: SessionRegistry::new(),
            repository,
            shutdown,
            pending_screenshots: PendingScreenshots::new(),
            scheduler_cache: SchedulerCache::new(),
            discovery: DiscoveryState::new(),
            fleet_events,
        })
    }
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Spawn the single background task that fans `fleet_events` out to every
/// bound operator session as a one-client `ClientListUpdate` (spec.md §4.4,
/// §8 scenario 5).
pub fn spawn_fleet_event_broadcaster(state: Arc<ServerState>) {
    let mut events = state.fleet_events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = state.shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            let FleetEvent::ClientStatusChanged { client_id, status } = match event {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "fleet event broadcaster lagged, dropping events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let client = match state.repository.clients.get(&client_id).await {
                Ok(Some(c)) => c,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(client_id = %client_id, err = %e, "fleet event broadcaster: repository lookup failed");
                    continue;
                }
            };

            let update = Envelope::ClientListUpdate(ClientListUpdate {
                clients: vec![ClientInfo {
                    id: client.id,
                    name: client.name,
                    status,
                    group: client.group,
                    location: client.location,
                    assigned_layout_id: client.assigned_layout_id,
                    last_seen_at: client.last_seen_at,
                }],
            });

            for session in state.sessions.operator_sessions().await {
                let _ = session.send(&update);
            }
        }
    });
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
