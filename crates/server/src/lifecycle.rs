// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client Lifecycle: registration, identity resolution, heartbeats, and
//! status transitions (spec.md §4.4).

use std::sync::Arc;

use chrono::Utc;

use crate::envelope::{Register, RegistrationResponse, RegistrationStatus};
use crate::model::{Client, ClientStatus, DeviceInfo};
use crate::repository::ConsumeOutcome;
use crate::state::{FleetEvent, ServerState};
use crate::tokens::fingerprint;

/// Result of a `Register` attempt: the response to send immediately, and —
/// only on success — the bound client id for the caller to finish wiring up
/// the session and trigger a scheduler evaluation.
pub struct RegistrationOutcome {
    pub response: RegistrationResponse,
    pub bound_client_id: Option<String>,
}

/// Handle an inbound `Register` envelope end to end (spec.md §4.4 steps 1-6).
///
/// Registration is all-or-nothing: the token is only validated (never
/// mutated) up front. `used_count` is incremented after the Client row has
/// committed, so a repository failure while resolving/upserting the Client
/// leaves the token completely unspent.
pub async fn register(state: &Arc<ServerState>, req: Register) -> RegistrationOutcome {
    let mac = req.mac_address.trim();
    let mac = if mac.is_empty() { None } else { Some(mac.to_owned()) };

    // Step 1: validate the registration token, if present — read-only.
    let fp_and_token = if let Some(ref raw_token) = req.registration_token {
        let fp = fingerprint(raw_token);
        let checked = match state.repository.tokens.check(&fp, mac.as_deref(), None, None).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(err = %e, "repository error checking registration token");
                return RegistrationOutcome {
                    response: RegistrationResponse {
                        status: RegistrationStatus::Error,
                        message: "internal error".to_owned(),
                        client_id: None,
                        assigned_layout_id: None,
                    },
                    bound_client_id: None,
                };
            }
        };
        match checked {
            ConsumeOutcome::Consumed(token) => Some((fp, token)),
            ConsumeOutcome::Rejected(failure) => {
                return RegistrationOutcome {
                    response: RegistrationResponse {
                        status: RegistrationStatus::Rejected,
                        message: failure.reason().to_owned(),
                        client_id: None,
                        assigned_layout_id: None,
                    },
                    bound_client_id: None,
                };
            }
        }
    } else {
        None
    };

    let (token_group, token_location) = match &fp_and_token {
        Some((_, token)) => (Some(token.restricted_to_group.clone()), Some(token.restricted_to_location.clone())),
        None => (None, None),
    };

    let outcome = register_resolved(state, req, mac, token_group, token_location).await;

    // Step 4: only now, with the Client row committed, spend the token.
    if outcome.bound_client_id.is_some() {
        if let Some((fp, _)) = fp_and_token {
            match state.repository.tokens.mark_used(&fp).await {
                Ok(ConsumeOutcome::Consumed(_)) => {}
                Ok(ConsumeOutcome::Rejected(failure)) => {
                    tracing::warn!(reason = failure.reason(), "registration token exhausted between check and commit");
                }
                Err(e) => tracing::warn!(err = %e, "repository error marking registration token used"),
            }
        }
    }

    outcome
}

async fn register_resolved(
    state: &Arc<ServerState>,
    req: Register,
    mac: Option<String>,
    token_group: Option<Option<String>>,
    token_location: Option<Option<String>>,
) -> RegistrationOutcome {
    // Step 2: resolve the Client by id, then by MAC, else create new.
    let existing = if let Some(ref id) = req.client_id {
        match state.repository.clients.get(id).await {
            Ok(found) => found,
            Err(e) => return internal_error(e),
        }
    } else {
        None
    };

    let existing = match existing {
        Some(c) => Some(c),
        None => match &mac {
            Some(mac) => match state.repository.clients.get_by_mac(mac).await {
                Ok(found) => found,
                Err(e) => return internal_error(e),
            },
            None => None,
        },
    };

    let ip = if req.ip_address.trim().is_empty() { None } else { Some(req.ip_address.clone()) };

    let mut client = existing.unwrap_or_else(|| Client::new(uuid::Uuid::new_v4().to_string(), mac.clone(), ip.clone()));

    // Step 3: update volatile fields. Existing clients keep their mac/name/group/location
    // unless the token restricted them to a specific value.
    client.mac_address = client.mac_address.or(mac);
    client.ip_address = ip.or(client.ip_address);
    client.device_info = req.device_info;
    client.last_seen_at = Utc::now();
    client.status = ClientStatus::Online;
    if let Some(Some(group)) = token_group {
        client.group = Some(group);
    }
    if let Some(Some(location)) = token_location {
        client.location = Some(location);
    }

    let client = match state.repository.clients.upsert(client).await {
        Ok(c) => c,
        Err(e) => return internal_error(e),
    };

    RegistrationOutcome {
        response: RegistrationResponse {
            status: RegistrationStatus::Accepted,
            message: "registered".to_owned(),
            client_id: Some(client.id.clone()),
            assigned_layout_id: client.assigned_layout_id.clone(),
        },
        bound_client_id: Some(client.id),
    }
}

fn internal_error(err: anyhow::Error) -> RegistrationOutcome {
    tracing::warn!(err = %err, "repository error during client registration");
    RegistrationOutcome {
        response: RegistrationResponse {
            status: RegistrationStatus::Error,
            message: "internal error".to_owned(),
            client_id: None,
            assigned_layout_id: None,
        },
        bound_client_id: None,
    }
}

/// Handle an inbound `Heartbeat`. Failures are logged and ignored — the
/// client simply won't look live on the next liveness sweep.
pub async fn heartbeat(
    state: &Arc<ServerState>,
    client_id: &str,
    status: Option<String>,
    device_info: DeviceInfo,
    offline_flag: Option<bool>,
) {
    let status = if offline_flag == Some(true) {
        ClientStatus::Offline
    } else {
        match status.as_deref() {
            Some("Online") => ClientStatus::Online,
            Some("Offline") => ClientStatus::Offline,
            Some("Error") => ClientStatus::Error,
            _ => ClientStatus::Online,
        }
    };

    let now = Utc::now();
    if let Err(e) = state
        .repository
        .clients
        .update_status(client_id, status, Some(device_info), now)
        .await
    {
        tracing::warn!(client_id, err = %e, "heartbeat update failed, ignoring");
        return;
    }

    let _ = state.fleet_events.send(FleetEvent::ClientStatusChanged { client_id: client_id.to_owned(), status });
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
