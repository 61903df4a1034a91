// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::ServerConfig;
use crate::envelope::RegistrationStatus;
use crate::model::RegistrationToken;
use crate::repository::mem::InMemoryStore;
use crate::state::ServerState;

fn test_state() -> Arc<ServerState> {
    let repository = Arc::new(InMemoryStore::new()).into_repository();
    ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new())
}

fn fresh_register() -> Register {
    Register {
        client_id: None,
        mac_address: "AA:BB:CC:DD:EE:01".to_owned(),
        ip_address: "192.168.1.50".to_owned(),
        device_info: DeviceInfo::default(),
        registration_token: None,
    }
}

#[tokio::test]
async fn register_without_token_creates_a_fresh_client() {
    let state = test_state();
    let outcome = register(&state, fresh_register()).await;

    assert_eq!(outcome.response.status, RegistrationStatus::Accepted);
    let client_id = outcome.bound_client_id.expect("should bind a client id");

    let stored = state.repository.clients.get(&client_id).await.unwrap().unwrap();
    assert_eq!(stored.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:01"));
    assert_eq!(stored.status, ClientStatus::Online);
}

#[tokio::test]
async fn register_reconnect_by_mac_converges_to_same_client_id() {
    let state = test_state();
    let first = register(&state, fresh_register()).await;
    let first_id = first.bound_client_id.unwrap();

    let mut second_req = fresh_register();
    second_req.client_id = None;
    let second = register(&state, second_req).await;

    assert_eq!(second.bound_client_id.as_deref(), Some(first_id.as_str()));
}

#[tokio::test]
async fn register_rejects_invalid_token() {
    let state = test_state();
    let mut req = fresh_register();
    req.registration_token = Some("not-a-real-token".to_owned());

    let outcome = register(&state, req).await;
    assert_eq!(outcome.response.status, RegistrationStatus::Rejected);
    assert!(outcome.bound_client_id.is_none());
}

#[tokio::test]
async fn register_with_valid_token_consumes_it_and_applies_restrictions() {
    let fp = crate::tokens::fingerprint("a-valid-token");
    let store = InMemoryStore::new();
    store
        .put_token(RegistrationToken {
            fingerprint: fp.clone(),
            expires_at: Utc::now() + Duration::hours(1),
            max_uses: 1,
            used_count: 0,
            restricted_to_group: Some("lobby".to_owned()),
            restricted_to_location: None,
            restricted_to_mac: None,
            is_active: true,
        })
        .await;
    let repository = Arc::new(store).into_repository();
    let state = ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new());

    let mut req = fresh_register();
    req.registration_token = Some("a-valid-token".to_owned());
    let outcome = register(&state, req).await;

    assert_eq!(outcome.response.status, RegistrationStatus::Accepted);
    let client_id = outcome.bound_client_id.unwrap();
    let stored = state.repository.clients.get(&client_id).await.unwrap().unwrap();
    assert_eq!(stored.group.as_deref(), Some("lobby"));

    let spent = state.repository.tokens.get_by_fingerprint(&fp).await.unwrap().unwrap();
    assert_eq!(spent.used_count, 1);
}

#[tokio::test]
async fn register_does_not_spend_token_when_rejected() {
    let state = test_state();
    let mut req = fresh_register();
    req.registration_token = Some("not-a-real-token".to_owned());

    let outcome = register(&state, req).await;
    assert_eq!(outcome.response.status, RegistrationStatus::Rejected);
    assert!(outcome.bound_client_id.is_none());
}

#[tokio::test]
async fn heartbeat_updates_status_and_broadcasts_fleet_event() {
    let state = test_state();
    let outcome = register(&state, fresh_register()).await;
    let client_id = outcome.bound_client_id.unwrap();

    let mut fleet_events = state.fleet_events.subscribe();
    heartbeat(&state, &client_id, Some("Offline".to_owned()), DeviceInfo::default(), None).await;

    let stored = state.repository.clients.get(&client_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ClientStatus::Offline);

    let FleetEvent::ClientStatusChanged { client_id: evt_id, status } = fleet_events.recv().await.unwrap();
    assert_eq!(evt_id, client_id);
    assert_eq!(status, ClientStatus::Offline);
}

#[tokio::test]
async fn heartbeat_offline_flag_overrides_reported_status_string() {
    let state = test_state();
    let outcome = register(&state, fresh_register()).await;
    let client_id = outcome.bound_client_id.unwrap();

    heartbeat(&state, &client_id, Some("Online".to_owned()), DeviceInfo::default(), Some(true)).await;

    let stored = state.repository.clients.get(&client_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ClientStatus::Offline);
}

#[tokio::test]
async fn heartbeat_for_unknown_client_is_ignored_without_panicking() {
    let state = test_state();
    heartbeat(&state, "no-such-client", Some("Online".to_owned()), DeviceInfo::default(), None).await;
}
