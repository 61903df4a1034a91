// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transient, in-memory `Session` state and the process-wide registry that
//! indexes live sessions by connection id, Client id, and Operator id
//! (spec.md §3, §4.2).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::envelope::Envelope;
use crate::model::Permission;

/// Which side of the wire protocol a `Session` belongs to. Set once, at the
/// first authenticating message (`Register` or `AppHeartbeat`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Client,
    Operator,
}

/// The principal a bound session speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalId {
    Client(String),
    Operator(String),
}

/// A live bidirectional connection. Unbound until the first authenticating
/// message arrives; at most one per `Client.id` / `OperatorRegistration.id`.
pub struct Session {
    pub connection_id: String,
    pub remote_address: SocketAddr,
    outbound: mpsc::Sender<Message>,
    binding: RwLock<Option<PrincipalId>>,
    pub permissions: RwLock<Vec<Permission>>,
    last_activity_epoch_ms: AtomicI64,
    pub protocol_error_count: AtomicU32,
    pub cancel: CancellationToken,
}

impl Session {
    pub fn new(connection_id: String, remote_address: SocketAddr, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            connection_id,
            remote_address,
            outbound,
            binding: RwLock::new(None),
            permissions: RwLock::new(Vec::new()),
            last_activity_epoch_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            protocol_error_count: AtomicU32::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn touch(&self) {
        self.last_activity_epoch_ms.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_epoch_ms.load(Ordering::Relaxed))
            .unwrap_or_else(Utc::now)
    }

    pub async fn principal(&self) -> Option<PrincipalId> {
        self.binding.read().await.clone()
    }

    pub async fn kind(&self) -> Option<SessionKind> {
        match self.binding.read().await.as_ref() {
            Some(PrincipalId::Client(_)) => Some(SessionKind::Client),
            Some(PrincipalId::Operator(_)) => Some(SessionKind::Operator),
            None => None,
        }
    }

    async fn bind_to(&self, principal: PrincipalId) {
        *self.binding.write().await = Some(principal);
    }

    /// Non-blocking enqueue. Overflow of the bounded queue is treated as an
    /// unhealthy session and the connection is torn down (spec.md §4.1, §5).
    pub fn send(&self, envelope: &Envelope) -> Result<(), crate::error::ServerError> {
        let json = serde_json::to_string(envelope).map_err(|_| crate::error::ServerError::Internal)?;
        self.outbound.try_send(Message::Text(json.into())).map_err(|_| {
            self.cancel.cancel();
            crate::error::ServerError::QueueOverflow
        })
    }

    pub fn close(&self) {
        let _ = self.outbound.try_send(Message::Close(None));
        self.cancel.cancel();
    }
}

/// Process-wide index of live sessions, keyed by connection id and, once
/// bound, by `Client.id` / `OperatorRegistration.id`.
#[derive(Default)]
pub struct SessionRegistry {
    by_connection: RwLock<HashMap<String, Arc<Session>>>,
    by_client: RwLock<HashMap<String, Arc<Session>>>,
    by_operator: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, session: Arc<Session>) {
        self.by_connection.write().await.insert(session.connection_id.clone(), session);
    }

    pub async fn detach(&self, connection_id: &str) {
        let Some(session) = self.by_connection.write().await.remove(connection_id) else { return };
        match session.principal().await {
            Some(PrincipalId::Client(id)) => {
                let mut map = self.by_client.write().await;
                if map.get(&id).is_some_and(|s| s.connection_id == connection_id) {
                    map.remove(&id);
                }
            }
            Some(PrincipalId::Operator(id)) => {
                let mut map = self.by_operator.write().await;
                if map.get(&id).is_some_and(|s| s.connection_id == connection_id) {
                    map.remove(&id);
                }
            }
            None => {}
        }
    }

    /// Bind a connection to a principal. If another live session already
    /// holds that principal, the older session is evicted with
    /// `Close(reason="replaced")` and the new connection wins.
    pub async fn bind_client(&self, session: &Arc<Session>, client_id: String) {
        session.bind_to(PrincipalId::Client(client_id.clone())).await;
        let mut map = self.by_client.write().await;
        if let Some(old) = map.insert(client_id, Arc::clone(session)) {
            if old.connection_id != session.connection_id {
                old.close();
            }
        }
    }

    pub async fn bind_operator(
        &self,
        session: &Arc<Session>,
        operator_id: String,
        permissions: Vec<Permission>,
    ) {
        session.bind_to(PrincipalId::Operator(operator_id.clone())).await;
        *session.permissions.write().await = permissions;
        let mut map = self.by_operator.write().await;
        if let Some(old) = map.insert(operator_id, Arc::clone(session)) {
            if old.connection_id != session.connection_id {
                old.close();
            }
        }
    }

    pub async fn lookup_by_connection(&self, connection_id: &str) -> Option<Arc<Session>> {
        self.by_connection.read().await.get(connection_id).cloned()
    }

    pub async fn lookup_client(&self, client_id: &str) -> Option<Arc<Session>> {
        self.by_client.read().await.get(client_id).cloned()
    }

    pub async fn lookup_operator(&self, operator_id: &str) -> Option<Arc<Session>> {
        self.by_operator.read().await.get(operator_id).cloned()
    }

    /// Snapshot of all bound client sessions, for the liveness monitor.
    pub async fn client_sessions(&self) -> Vec<(String, Arc<Session>)> {
        self.by_client.read().await.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }

    /// Snapshot of all bound operator sessions, for broadcast.
    pub async fn operator_sessions(&self) -> Vec<Arc<Session>> {
        self.by_operator.read().await.values().cloned().collect()
    }

    pub async fn client_session_count(&self) -> usize {
        self.by_client.read().await.len()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
