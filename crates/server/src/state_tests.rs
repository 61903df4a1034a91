// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::config::ServerConfig;
use crate::model::{Client, ClientStatus, Permission};
use crate::repository::mem::InMemoryStore;
use crate::session::Session;

fn test_state() -> Arc<ServerState> {
    let repository = Arc::new(InMemoryStore::new()).into_repository();
    ServerState::new(ServerConfig::for_test(), repository, CancellationToken::new())
}

fn test_session(connection_id: &str) -> (Arc<Session>, mpsc::Receiver<axum::extract::ws::Message>) {
    let (tx, rx) = mpsc::channel(8);
    let addr: SocketAddr = "127.0.0.1:9300".parse().unwrap();
    (Arc::new(Session::new(connection_id.to_owned(), addr, tx)), rx)
}

async fn recv_update(rx: &mut mpsc::Receiver<axum::extract::ws::Message>) -> ClientListUpdate {
    let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("channel closed");
    let axum::extract::ws::Message::Text(text) = msg else { panic!("expected text frame") };
    match serde_json::from_str::<Envelope>(&text).unwrap() {
        Envelope::ClientListUpdate(update) => update,
        other => panic!("expected ClientListUpdate, got {other:?}"),
    }
}

#[tokio::test]
async fn fleet_event_broadcaster_forwards_status_change_to_bound_operators() {
    let state = test_state();
    spawn_fleet_event_broadcaster(Arc::clone(&state));

    let client = Client::new("client-1".to_owned(), None, None);
    state.repository.clients.upsert(client).await.unwrap();

    let (operator_session, mut rx) = test_session("op-conn-1");
    state.sessions.bind_operator(&operator_session, "op-1".to_owned(), vec![Permission::View]).await;

    state
        .fleet_events
        .send(FleetEvent::ClientStatusChanged { client_id: "client-1".to_owned(), status: ClientStatus::Offline })
        .unwrap();

    let update = recv_update(&mut rx).await;
    assert_eq!(update.clients.len(), 1);
    assert_eq!(update.clients[0].id, "client-1");
    assert_eq!(update.clients[0].status, ClientStatus::Offline);
}

#[tokio::test]
async fn fleet_event_broadcaster_ignores_events_for_unknown_clients() {
    let state = test_state();
    spawn_fleet_event_broadcaster(Arc::clone(&state));

    let (operator_session, mut rx) = test_session("op-conn-1");
    state.sessions.bind_operator(&operator_session, "op-1".to_owned(), vec![Permission::View]).await;

    state
        .fleet_events
        .send(FleetEvent::ClientStatusChanged { client_id: "no-such-client".to_owned(), status: ClientStatus::Offline })
        .unwrap();

    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "expected no message for an unknown client id");
}
