// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::ServerConfig;
use crate::envelope::{AppHeartbeat, RegistrationStatus};
use crate::model::{OperatorRegistration, OperatorStatus, Permission};
use crate::repository::mem::InMemoryStore;

fn test_state() -> Arc<ServerState> {
    let repository = Arc::new(InMemoryStore::new()).into_repository();
    ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new())
}

fn test_session(connection_id: &str) -> (Arc<Session>, mpsc::Receiver<axum::extract::ws::Message>) {
    let (tx, rx) = mpsc::channel(8);
    let addr: SocketAddr = "127.0.0.1:9200".parse().unwrap();
    (Arc::new(Session::new(connection_id.to_owned(), addr, tx)), rx)
}

async fn recv_text(rx: &mut mpsc::Receiver<axum::extract::ws::Message>) -> String {
    match rx.recv().await.unwrap() {
        axum::extract::ws::Message::Text(t) => t.to_string(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_replies_bad_envelope() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    route(&state, &session, "not json").await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("bad_envelope"));
    assert!(!session.cancel.is_cancelled());
}

#[tokio::test]
async fn server_originated_type_is_rejected_as_unknown_message() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let json = r#"{"type":"DisplayUpdate","LayoutId":"l1","Elements":null}"#;
    route(&state, &session, json).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("unknown_message"));
}

#[tokio::test]
async fn protocol_error_threshold_closes_session() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    for _ in 0..=state.config.protocol_error_threshold {
        route(&state, &session, "not json").await;
        let _ = recv_text(&mut rx).await;
    }

    assert!(session.cancel.is_cancelled());
}

#[tokio::test]
async fn heartbeat_without_registration_is_unauthenticated() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let json = r#"{"type":"Heartbeat"}"#;
    route(&state, &session, json).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("unauthenticated"));
}

#[tokio::test]
async fn register_binds_session_and_replies_accepted() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let json = r#"{"type":"Register","MacAddress":"AA:BB:CC:DD:EE:01","IpAddress":"192.168.1.50"}"#;
    route(&state, &session, json).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("RegistrationResponse"));
    assert!(reply.contains("Accepted"));
    assert!(!session.cancel.is_cancelled());
    assert!(session.principal().await.is_some());
}

#[tokio::test]
async fn request_client_list_requires_operator_view_permission() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let json = r#"{"type":"RequestClientList"}"#;
    route(&state, &session, json).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("unauthenticated"));
}

#[tokio::test]
async fn app_heartbeat_with_valid_token_binds_operator_session() {
    let state = test_state();
    let store_operator = OperatorRegistration {
        id: "op-1".to_owned(),
        device_identifier: "device-abc".to_owned(),
        status: OperatorStatus::Approved,
        token_fingerprint: Some(crate::tokens::fingerprint("secret-token")),
        permissions: vec![Permission::View, Permission::Control],
        registered_at: chrono::Utc::now(),
        approved_at: Some(chrono::Utc::now()),
        last_seen_at: None,
    };
    // Seed through the concrete store before wrapping as a Repository.
    let store = InMemoryStore::new();
    store.put_operator(store_operator).await;
    let repository = Arc::new(store).into_repository();
    let state = ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new());

    let (session, _rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let envelope = Envelope::AppHeartbeat(AppHeartbeat {
        app_id: "device-abc".to_owned(),
        token: "secret-token".to_owned(),
    });
    route(&state, &session, &serde_json::to_string(&envelope).unwrap()).await;

    assert!(!session.cancel.is_cancelled());
    let permissions = operator_permissions(&session).await.unwrap();
    assert!(permissions.contains(&Permission::Control));
}

#[tokio::test]
async fn app_heartbeat_with_wrong_token_closes_session() {
    let store = InMemoryStore::new();
    store
        .put_operator(OperatorRegistration {
            id: "op-1".to_owned(),
            device_identifier: "device-abc".to_owned(),
            status: OperatorStatus::Approved,
            token_fingerprint: Some(crate::tokens::fingerprint("secret-token")),
            permissions: vec![Permission::View],
            registered_at: chrono::Utc::now(),
            approved_at: Some(chrono::Utc::now()),
            last_seen_at: None,
        })
        .await;
    let repository = Arc::new(store).into_repository();
    let state = ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new());

    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let envelope = Envelope::AppHeartbeat(AppHeartbeat {
        app_id: "device-abc".to_owned(),
        token: "wrong-token".to_owned(),
    });
    route(&state, &session, &serde_json::to_string(&envelope).unwrap()).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("token_invalid"));
    assert!(session.cancel.is_cancelled());
}

#[tokio::test]
async fn send_command_requires_authenticated_operator() {
    let state = test_state();
    let (session, mut rx) = test_session("conn-1");
    state.sessions.attach(Arc::clone(&session)).await;

    let json = r#"{"type":"SendCommand","TargetDeviceId":"c1","Command":"Restart"}"#;
    route(&state, &session, json).await;

    let reply = recv_text(&mut rx).await;
    assert!(reply.contains("unauthenticated"));
}
