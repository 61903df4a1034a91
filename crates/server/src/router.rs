// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message Router (spec.md §4.3): parses inbound envelopes, dispatches by
//! `type` to the owning subsystem, and maps failures to wire `Error`
//! envelopes. The only place that turns an internal failure into a frame.

use std::sync::Arc;

use crate::dispatch::{self, matches_filter, PendingScreenshots};
use crate::envelope::{
    ClientInfo, ClientListUpdate, CommandResult, Envelope, LayoutInfo, LayoutListResponse,
    RegistrationStatus,
};
use crate::error::ServerError;
use crate::model::Permission;
use crate::session::{PrincipalId, Session};
use crate::state::ServerState;
use crate::{lifecycle, scheduler, tokens};

/// Parse and route one inbound text frame. Never panics on malformed input.
pub async fn route(state: &Arc<ServerState>, session: &Arc<Session>, raw: &str) {
    session.touch();

    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!(connection_id = %session.connection_id, err = %e, "bad envelope");
            reply_protocol_error(state, session, ServerError::BadEnvelope, "malformed envelope").await;
            return;
        }
    };

    match envelope {
        Envelope::Register(req) => handle_register(state, session, req).await,
        Envelope::Heartbeat(req) => handle_heartbeat(state, session, req).await,
        Envelope::Screenshot(req) => handle_screenshot(state, session, req).await,
        Envelope::AppHeartbeat(req) => handle_app_heartbeat(state, session, req).await,
        Envelope::RequestClientList(req) => handle_request_client_list(state, session, req).await,
        Envelope::RequestLayoutList(_) => handle_request_layout_list(state, session).await,
        Envelope::SendCommand(req) => handle_send_command(state, session, req).await,
        Envelope::AssignLayout(req) => handle_assign_layout(state, session, req).await,
        Envelope::RequestScreenshot(req) => handle_request_screenshot(state, session, req).await,

        // Server-originated types are never valid inbound.
        Envelope::RegistrationResponse(_)
        | Envelope::DisplayUpdate(_)
        | Envelope::Command(_)
        | Envelope::ClientListUpdate(_)
        | Envelope::LayoutListResponse(_)
        | Envelope::ScreenshotResult(_)
        | Envelope::CommandResult(_)
        | Envelope::Error(_) => {
            reply_protocol_error(state, session, ServerError::UnknownMessage, "server-originated type").await;
        }
    }
}

async fn handle_register(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::Register) {
    let outcome = lifecycle::register(state, req).await;
    let accepted = outcome.response.status == RegistrationStatus::Accepted;

    if let Some(client_id) = outcome.bound_client_id.clone() {
        state.sessions.bind_client(session, client_id.clone()).await;
    }

    let _ = session.send(&Envelope::RegistrationResponse(outcome.response));

    if !accepted {
        // Authentication/repository failures close the session after the reply (spec.md §7).
        session.close();
        return;
    }

    if let Some(client_id) = outcome.bound_client_id {
        scheduler::evaluate_one(state, &client_id).await;
    }
}

async fn handle_heartbeat(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::Heartbeat) {
    let Some(client_id) = client_principal(session).await else {
        reply_error(session, ServerError::Unauthenticated, "not registered").await;
        return;
    };
    lifecycle::heartbeat(state, &client_id, req.status, req.device_info, req.offline).await;
}

async fn handle_screenshot(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::Screenshot) {
    let Some(client_id) = client_principal(session).await else {
        reply_error(session, ServerError::Unauthenticated, "not registered").await;
        return;
    };
    // The session's bound identity is authoritative; the payload's ClientId is informational.
    let _ = req.client_id;
    PendingScreenshots::resolve(state, &client_id, req.image_data).await;
}

async fn handle_app_heartbeat(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::AppHeartbeat) {
    let operator = match state.repository.operators.get_by_device_identifier(&req.app_id).await {
        Ok(Some(op)) => op,
        Ok(None) => {
            tracing::info!(app_id = %req.app_id, "app heartbeat: unknown operator, closing");
            reply_error(session, ServerError::Unauthenticated, "unknown operator").await;
            session.close();
            return;
        }
        Err(e) => {
            tracing::warn!(err = %e, "app heartbeat: repository error");
            reply_error(session, ServerError::Internal, "internal error").await;
            session.close();
            return;
        }
    };

    let fp = tokens::fingerprint(&req.token);
    let authorized = operator.status == crate::model::OperatorStatus::Approved
        && operator.token_fingerprint.as_deref() == Some(fp.as_str());

    if !authorized {
        tracing::info!(app_id = %req.app_id, "app heartbeat: rejected, closing");
        reply_error(session, ServerError::TokenInvalid, "operator token invalid or unapproved").await;
        session.close();
        return;
    }

    state.sessions.bind_operator(session, operator.id.clone(), operator.permissions.clone()).await;
    if let Err(e) = state.repository.operators.update_last_seen(&operator.id, chrono::Utc::now()).await {
        tracing::warn!(operator_id = %operator.id, err = %e, "failed to update operator last_seen");
    }
}

async fn handle_request_client_list(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    req: crate::envelope::RequestClientList,
) {
    if !require_operator(state, session, Permission::View).await {
        return;
    }
    let clients = match state.repository.clients.list().await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(err = %e, "request client list: repository error");
            reply_error(session, ServerError::Internal, "internal error").await;
            return;
        }
    };
    let clients = clients
        .into_iter()
        .filter(|c| matches_filter(c.status, req.filter))
        .map(|c| ClientInfo {
            id: c.id,
            name: c.name,
            status: c.status,
            group: c.group,
            location: c.location,
            assigned_layout_id: c.assigned_layout_id,
            last_seen_at: c.last_seen_at,
        })
        .collect();
    let _ = session.send(&Envelope::ClientListUpdate(ClientListUpdate { clients }));
}

async fn handle_request_layout_list(state: &Arc<ServerState>, session: &Arc<Session>) {
    if !require_operator(state, session, Permission::View).await {
        return;
    }
    let layouts = match state.repository.layouts.list().await {
        Ok(l) => l,
        Err(e) => {
            tracing::warn!(err = %e, "request layout list: repository error");
            reply_error(session, ServerError::Internal, "internal error").await;
            return;
        }
    };
    let layouts = layouts
        .into_iter()
        .map(|l| LayoutInfo { id: l.id, name: l.name, category: l.category, version: l.version })
        .collect();
    let _ = session.send(&Envelope::LayoutListResponse(LayoutListResponse { layouts }));
}

async fn handle_send_command(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::SendCommand) {
    let Some(permissions) = operator_permissions(session).await else {
        reply_error(session, ServerError::Unauthenticated, "not authenticated").await;
        return;
    };
    let result = dispatch::send_command(state, &permissions, &req.target_device_id, req.command, req.parameters).await;
    let _ = session.send(&Envelope::CommandResult(result));
}

async fn handle_assign_layout(state: &Arc<ServerState>, session: &Arc<Session>, req: crate::envelope::AssignLayout) {
    if !require_operator(state, session, Permission::Manage).await {
        return;
    }
    let client = match state.repository.clients.get(&req.device_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            reply_error(session, ServerError::NotConnected, "unknown client").await;
            return;
        }
        Err(e) => {
            tracing::warn!(err = %e, "assign layout: repository error");
            reply_error(session, ServerError::Internal, "internal error").await;
            return;
        }
    };
    let mut client = client;
    client.assigned_layout_id = Some(req.layout_id);
    if let Err(e) = state.repository.clients.upsert(client).await {
        tracing::warn!(err = %e, "assign layout: failed to persist");
        reply_error(session, ServerError::Internal, "internal error").await;
        return;
    }
    scheduler::evaluate_one(state, &req.device_id).await;
}

async fn handle_request_screenshot(
    state: &Arc<ServerState>,
    session: &Arc<Session>,
    req: crate::envelope::RequestScreenshot,
) {
    let Some(permissions) = operator_permissions(session).await else {
        reply_error(session, ServerError::Unauthenticated, "not authenticated").await;
        return;
    };
    if let Err(reason) =
        dispatch::request_screenshot(state, &session.connection_id, &permissions, &req.device_id).await
    {
        let err = match reason {
            "forbidden" => ServerError::Forbidden,
            "not_connected" => ServerError::NotConnected,
            _ => ServerError::QueueOverflow,
        };
        reply_error(session, err, reason).await;
    }
}

async fn client_principal(session: &Arc<Session>) -> Option<String> {
    match session.principal().await {
        Some(PrincipalId::Client(id)) => Some(id),
        _ => None,
    }
}

async fn operator_permissions(session: &Arc<Session>) -> Option<Vec<Permission>> {
    match session.principal().await {
        Some(PrincipalId::Operator(_)) => Some(session.permissions.read().await.clone()),
        _ => None,
    }
}

async fn require_operator(state: &Arc<ServerState>, session: &Arc<Session>, permission: Permission) -> bool {
    let _ = state;
    let Some(permissions) = operator_permissions(session).await else {
        reply_error(session, ServerError::Unauthenticated, "not authenticated").await;
        return false;
    };
    if !permissions.contains(&permission) {
        reply_error(session, ServerError::Forbidden, "missing permission").await;
        return false;
    }
    true
}

async fn reply_error(session: &Arc<Session>, err: ServerError, message: &str) {
    let _ = session.send(&Envelope::error(err, message));
}

/// Protocol errors (`bad_envelope`, `unknown_message`) count toward the
/// per-session rate threshold; exceeding it closes the connection.
async fn reply_protocol_error(state: &Arc<ServerState>, session: &Arc<Session>, err: ServerError, message: &str) {
    reply_error(session, err, message).await;
    let count = session.protocol_error_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
    if count > state.config.protocol_error_threshold {
        tracing::info!(connection_id = %session.connection_id, count, "protocol error threshold exceeded, closing");
        session.close();
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
