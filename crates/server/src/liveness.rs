// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background liveness monitor: demotes silent Clients to `Offline`.

use std::sync::Arc;

use chrono::Utc;

use crate::model::ClientStatus;
use crate::state::{FleetEvent, ServerState};

/// Spawn the single background task that scans all bound Client sessions
/// every `liveness_check_interval` and demotes stale ones to `Offline`.
pub fn spawn_liveness_monitor(state: Arc<ServerState>) {
    let interval = state.config.liveness_check_interval();
    let timeout = chrono::Duration::from_std(state.config.client_heartbeat_timeout()).unwrap_or(chrono::Duration::seconds(90));

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let clients = match state.repository.clients.list().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(err = %e, "liveness monitor: repository list failed");
                    continue;
                }
            };

            let now = Utc::now();
            for client in clients {
                if client.status != ClientStatus::Online {
                    continue;
                }
                if !is_stale(now, client.last_seen_at, timeout) {
                    continue;
                }

                tracing::info!(client_id = %client.id, "client heartbeat timed out, demoting to offline");
                if let Err(e) = state
                    .repository
                    .clients
                    .update_status(&client.id, ClientStatus::Offline, None, client.last_seen_at)
                    .await
                {
                    tracing::warn!(client_id = %client.id, err = %e, "failed to persist offline transition");
                    continue;
                }

                if let Some(session) = state.sessions.lookup_client(&client.id).await {
                    session.close();
                }

                let _ = state.fleet_events.send(FleetEvent::ClientStatusChanged {
                    client_id: client.id.clone(),
                    status: ClientStatus::Offline,
                });
            }
        }
    });
}

/// A Client is stale once it has gone strictly past `timeout` since
/// `last_seen_at` (spec.md §8: exactly on the boundary keeps it Online).
fn is_stale(now: chrono::DateTime<Utc>, last_seen_at: chrono::DateTime<Utc>, timeout: chrono::Duration) -> bool {
    now - last_seen_at > timeout
}

#[cfg(test)]
#[path = "liveness_tests.rs"]
mod tests;
