// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command Dispatcher: forwards operator commands to clients and correlates
//! asynchronous screenshot replies back to the requesting operator session
//! (spec.md §4.5). Owns the pending-screenshot table exclusively; no other
//! component reaches into it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::envelope::{ClientListFilter, CommandEnvelope, CommandResult, Envelope, RemoteCommand, ScreenshotResult};
use crate::model::Permission;
use crate::state::ServerState;

struct PendingEntry {
    request_id: String,
    operator_connection_id: String,
    cancel: CancellationToken,
}

/// Pending screenshot requests, keyed by `client_id`, FIFO per client.
#[derive(Default)]
pub struct PendingScreenshots {
    inner: tokio::sync::Mutex<HashMap<String, VecDeque<PendingEntry>>>,
}

impl PendingScreenshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and spawn its TTL reaper.
    async fn insert(state: &Arc<ServerState>, client_id: String, request_id: String, operator_connection_id: String) {
        let cancel = CancellationToken::new();
        {
            let mut inner = state.pending_screenshots.inner.lock().await;
            inner.entry(client_id.clone()).or_default().push_back(PendingEntry {
                request_id: request_id.clone(),
                operator_connection_id: operator_connection_id.clone(),
                cancel: cancel.clone(),
            });
        }

        let ttl = state.config.screenshot_timeout();
        let state = Arc::clone(state);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    let removed = {
                        let mut inner = state.pending_screenshots.inner.lock().await;
                        if let Some(queue) = inner.get_mut(&client_id) {
                            if let Some(pos) = queue.iter().position(|e| e.request_id == request_id) {
                                queue.remove(pos)
                            } else {
                                None
                            }
                        } else {
                            None
                        }
                    };
                    if let Some(entry) = removed {
                        if let Some(op_session) = state.sessions.lookup_by_connection(&entry.operator_connection_id).await {
                            let _ = op_session.send(&Envelope::ScreenshotResult(ScreenshotResult {
                                request_id: entry.request_id,
                                image_data: None,
                                error: Some("timeout".to_owned()),
                            }));
                        }
                    }
                }
            }
        });
    }

    /// Deliver an incoming `Screenshot` reply to the first pending requester
    /// for this client, if any. Silently discarded if the operator departed.
    pub async fn resolve(state: &Arc<ServerState>, client_id: &str, image_data: String) {
        let entry = {
            let mut inner = state.pending_screenshots.inner.lock().await;
            inner.get_mut(client_id).and_then(|q| q.pop_front())
        };
        let Some(entry) = entry else { return };
        entry.cancel.cancel();
        if let Some(op_session) = state.sessions.lookup_by_connection(&entry.operator_connection_id).await {
            let _ = op_session.send(&Envelope::ScreenshotResult(ScreenshotResult {
                request_id: entry.request_id,
                image_data: Some(image_data),
                error: None,
            }));
        }
    }
}

/// Handle `SendCommand` from an operator: permission check, lookup, forward.
pub async fn send_command(
    state: &Arc<ServerState>,
    operator_permissions: &[Permission],
    target_client_id: &str,
    command: RemoteCommand,
    parameters: Option<serde_json::Value>,
) -> CommandResult {
    if !operator_permissions.contains(&Permission::Control) {
        return CommandResult {
            device_id: target_client_id.to_owned(),
            command,
            success: false,
            message: Some("forbidden".to_owned()),
        };
    }

    let Some(client_session) = state.sessions.lookup_client(target_client_id).await else {
        return CommandResult {
            device_id: target_client_id.to_owned(),
            command,
            success: false,
            message: Some("not_connected".to_owned()),
        };
    };

    match client_session.send(&Envelope::Command(CommandEnvelope { command, parameters })) {
        Ok(()) => {
            CommandResult { device_id: target_client_id.to_owned(), command, success: true, message: None }
        }
        Err(_) => CommandResult {
            device_id: target_client_id.to_owned(),
            command,
            success: false,
            message: Some("queue_overflow".to_owned()),
        },
    }
}

/// Handle `RequestScreenshot` from an operator. Returns `Err` with an
/// operator-facing reason if the client is unreachable or permission is missing.
pub async fn request_screenshot(
    state: &Arc<ServerState>,
    operator_connection_id: &str,
    operator_permissions: &[Permission],
    client_id: &str,
) -> Result<String, &'static str> {
    if !operator_permissions.contains(&Permission::Control) {
        return Err("forbidden");
    }
    let Some(client_session) = state.sessions.lookup_client(client_id).await else {
        return Err("not_connected");
    };

    let request_id = Uuid::new_v4().to_string();
    PendingScreenshots::insert(state, client_id.to_owned(), request_id.clone(), operator_connection_id.to_owned())
        .await;

    client_session
        .send(&Envelope::Command(CommandEnvelope { command: RemoteCommand::Screenshot, parameters: None }))
        .map_err(|_| "queue_overflow")?;

    Ok(request_id)
}

/// `all`/`online`/`offline` filter for `RequestClientList`.
pub fn matches_filter(status: crate::model::ClientStatus, filter: ClientListFilter) -> bool {
    match filter {
        ClientListFilter::All => true,
        ClientListFilter::Online => status == crate::model::ClientStatus::Online,
        ClientListFilter::Offline => status != crate::model::ClientStatus::Online,
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
