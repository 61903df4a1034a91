// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::ServerConfig;
use crate::model::ClientStatus;
use crate::repository::mem::InMemoryStore;
use crate::session::Session;
use crate::state::ServerState;

fn test_state() -> Arc<ServerState> {
    let repository = Arc::new(InMemoryStore::new()).into_repository();
    ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new())
}

fn test_session(connection_id: &str) -> (Arc<Session>, mpsc::Receiver<axum::extract::ws::Message>) {
    let (tx, rx) = mpsc::channel(8);
    let addr: SocketAddr = "127.0.0.1:9100".parse().unwrap();
    (Arc::new(Session::new(connection_id.to_owned(), addr, tx)), rx)
}

#[test]
fn matches_filter_all_always_true() {
    assert!(matches_filter(ClientStatus::Online, ClientListFilter::All));
    assert!(matches_filter(ClientStatus::Offline, ClientListFilter::All));
    assert!(matches_filter(ClientStatus::Error, ClientListFilter::All));
}

#[test]
fn matches_filter_online_and_offline_partition_statuses() {
    assert!(matches_filter(ClientStatus::Online, ClientListFilter::Online));
    assert!(!matches_filter(ClientStatus::Offline, ClientListFilter::Online));

    assert!(matches_filter(ClientStatus::Offline, ClientListFilter::Offline));
    assert!(matches_filter(ClientStatus::Error, ClientListFilter::Offline));
    assert!(!matches_filter(ClientStatus::Online, ClientListFilter::Offline));
}

#[tokio::test]
async fn send_command_forbidden_without_control_permission() {
    let state = test_state();
    let result = send_command(&state, &[Permission::View], "client-1", RemoteCommand::Restart, None).await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("forbidden"));
}

#[tokio::test]
async fn send_command_reports_not_connected_when_client_absent() {
    let state = test_state();
    let result = send_command(&state, &[Permission::Control], "client-1", RemoteCommand::Restart, None).await;
    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("not_connected"));
}

#[tokio::test]
async fn send_command_forwards_to_connected_client() {
    let state = test_state();
    let (client_session, mut rx) = test_session("conn-client");
    state.sessions.attach(Arc::clone(&client_session)).await;
    state.sessions.bind_client(&client_session, "client-1".to_owned()).await;

    let result = send_command(&state, &[Permission::Control], "client-1", RemoteCommand::Restart, None).await;
    assert!(result.success);
    assert!(result.message.is_none());

    let axum::extract::ws::Message::Text(text) = rx.recv().await.unwrap() else { panic!("expected text frame") };
    assert!(text.contains("Restart"));
}

#[tokio::test]
async fn request_screenshot_forbidden_without_control_permission() {
    let state = test_state();
    let result = request_screenshot(&state, "op-conn", &[Permission::View], "client-1").await;
    assert_eq!(result, Err("forbidden"));
}

#[tokio::test]
async fn request_screenshot_reports_not_connected_when_client_absent() {
    let state = test_state();
    let result = request_screenshot(&state, "op-conn", &[Permission::Control], "client-1").await;
    assert_eq!(result, Err("not_connected"));
}

#[tokio::test]
async fn request_screenshot_dispatches_and_resolve_delivers_to_operator() {
    let state = test_state();
    let (client_session, mut client_rx) = test_session("conn-client");
    state.sessions.attach(Arc::clone(&client_session)).await;
    state.sessions.bind_client(&client_session, "client-1".to_owned()).await;

    let (operator_session, mut operator_rx) = test_session("conn-operator");
    state.sessions.attach(Arc::clone(&operator_session)).await;

    let request_id =
        request_screenshot(&state, "conn-operator", &[Permission::Control], "client-1").await.unwrap();

    let axum::extract::ws::Message::Text(text) = client_rx.recv().await.unwrap() else {
        panic!("expected text frame")
    };
    assert!(text.contains("Screenshot"));

    PendingScreenshots::resolve(&state, "client-1", "base64-image-data".to_owned()).await;

    let axum::extract::ws::Message::Text(reply) = operator_rx.recv().await.unwrap() else {
        panic!("expected text frame")
    };
    assert!(reply.contains(&request_id));
    assert!(reply.contains("base64-image-data"));
}

#[tokio::test]
async fn resolve_is_a_no_op_when_nothing_pending() {
    let state = test_state();
    // No pending entry for this client; must not panic and must not send anything.
    PendingScreenshots::resolve(&state, "no-such-client", "ignored".to_owned()).await;
}
