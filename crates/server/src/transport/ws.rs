// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The combined Client/Operator WebSocket endpoint (spec.md §4.1, §4.2,
//! §9). A session's `kind` is not chosen here; it is set the moment the
//! first authenticating message (`Register` or `AppHeartbeat`) binds it,
//! inside the Router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::router;
use crate::session::Session;
use crate::state::ServerState;

/// `GET {endpointPath}` — upgrade to the control-plane WebSocket.
pub async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(remote_address): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(state, socket, remote_address))
}

async fn handle_socket(state: Arc<ServerState>, socket: WebSocket, remote_address: SocketAddr) {
    let connection_id = Uuid::new_v4().to_string();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(state.config.send_queue_capacity);
    let session = Arc::new(Session::new(connection_id.clone(), remote_address, outbound_tx));
    state.sessions.attach(Arc::clone(&session)).await;

    let (mut ws_tx, mut ws_rx) = socket.split();
    let cancel = session.cancel.clone();

    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = outbound_rx.recv() => {
                    match msg {
                        Some(m) => {
                            let is_close = matches!(m, Message::Close(_));
                            if ws_tx.send(m).await.is_err() || is_close {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = session.cancel.cancelled() => break,
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        router::route(&state, &session, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    session.cancel.cancel();
    writer.abort();
    state.sessions.detach(&connection_id).await;
}
