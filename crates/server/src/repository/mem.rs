// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process repository implementation for development and tests.
//!
//! Grounded on `CredentialBroker`'s `RwLock<HashMap<...>>` account table and
//! its JSON `persist::load`/`save` (write-tmp-then-rename) pattern; the
//! production store is out of scope (spec.md §1), this is ambient dev/test
//! tooling only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{
    Client, ClientStatus, DeviceInfo, Layout, OperatorRegistration, RegistrationToken, Schedule,
    TokenCheckFailure,
};
use crate::repository::{
    ClientRepository, ConsumeOutcome, LayoutRepository, OperatorRepository, Repository,
    ScheduleRepository, TokenRepository,
};

/// On-disk snapshot of the in-memory store, for dev-mode persistence across restarts.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    clients: HashMap<String, Client>,
    layouts: HashMap<String, Layout>,
    schedules: Vec<Schedule>,
    tokens: HashMap<String, RegistrationToken>,
    operators: HashMap<String, OperatorRegistration>,
}

/// Load a snapshot from a JSON file. Missing file is not an error.
pub fn load(path: &Path) -> anyhow::Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save a snapshot to a JSON file atomically (write tmp + rename).
fn save(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

struct Inner {
    clients: HashMap<String, Client>,
    layouts: HashMap<String, Layout>,
    schedules: Vec<Schedule>,
    tokens: HashMap<String, RegistrationToken>,
    operators: HashMap<String, OperatorRegistration>,
}

/// Single in-memory store shared by all five repository ports.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    persist_path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                clients: HashMap::new(),
                layouts: HashMap::new(),
                schedules: Vec::new(),
                tokens: HashMap::new(),
                operators: HashMap::new(),
            }),
            persist_path: None,
        }
    }

    /// Enable write-through snapshotting to `path` after every mutation.
    pub fn with_persistence(mut self, path: PathBuf) -> Self {
        self.persist_path = Some(path);
        self
    }

    /// Load a prior snapshot from disk, if `with_persistence` was set and the file exists.
    pub async fn load_persisted(&self) -> anyhow::Result<()> {
        let Some(ref path) = self.persist_path else { return Ok(()) };
        if let Some(snapshot) = load(path)? {
            let mut inner = self.inner.write().await;
            inner.clients = snapshot.clients;
            inner.layouts = snapshot.layouts;
            inner.schedules = snapshot.schedules;
            inner.tokens = snapshot.tokens;
            inner.operators = snapshot.operators;
        }
        Ok(())
    }

    async fn persist(&self, inner: &Inner) {
        let Some(ref path) = self.persist_path else { return };
        let snapshot = Snapshot {
            clients: inner.clients.clone(),
            layouts: inner.layouts.clone(),
            schedules: inner.schedules.clone(),
            tokens: inner.tokens.clone(),
            operators: inner.operators.clone(),
        };
        if let Err(e) = save(path, &snapshot) {
            tracing::warn!(err = %e, "failed to persist in-memory repository snapshot");
        }
    }

    /// Seed a layout directly (test/dev helper).
    pub async fn put_layout(&self, layout: Layout) {
        let mut inner = self.inner.write().await;
        inner.layouts.insert(layout.id.clone(), layout);
        self.persist(&inner).await;
    }

    /// Seed a schedule directly (test/dev helper).
    pub async fn put_schedule(&self, schedule: Schedule) {
        let mut inner = self.inner.write().await;
        inner.schedules.push(schedule);
        self.persist(&inner).await;
    }

    /// Seed a registration token directly (test/dev helper).
    pub async fn put_token(&self, token: RegistrationToken) {
        let mut inner = self.inner.write().await;
        inner.tokens.insert(token.fingerprint.clone(), token);
        self.persist(&inner).await;
    }

    /// Seed an operator registration directly (test/dev helper).
    pub async fn put_operator(&self, operator: OperatorRegistration) {
        let mut inner = self.inner.write().await;
        inner.operators.insert(operator.id.clone(), operator);
        self.persist(&inner).await;
    }

    /// Wrap this store into a full `Repository` bundle. `Arc`-shared across ports.
    pub fn into_repository(self: std::sync::Arc<Self>) -> Repository {
        Repository {
            clients: Box::new(ClientPort(self.clone())),
            layouts: Box::new(LayoutPort(self.clone())),
            schedules: Box::new(SchedulePort(self.clone())),
            tokens: Box::new(TokenPort(self.clone())),
            operators: Box::new(OperatorPort(self)),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct ClientPort(std::sync::Arc<InMemoryStore>);
struct LayoutPort(std::sync::Arc<InMemoryStore>);
struct SchedulePort(std::sync::Arc<InMemoryStore>);
struct TokenPort(std::sync::Arc<InMemoryStore>);
struct OperatorPort(std::sync::Arc<InMemoryStore>);

#[async_trait]
impl ClientRepository for ClientPort {
    async fn get(&self, id: &str) -> anyhow::Result<Option<Client>> {
        Ok(self.0.inner.read().await.clients.get(id).cloned())
    }

    async fn get_by_mac(&self, mac: &str) -> anyhow::Result<Option<Client>> {
        Ok(self
            .0
            .inner
            .read()
            .await
            .clients
            .values()
            .find(|c| c.mac_address.as_deref() == Some(mac))
            .cloned())
    }

    async fn upsert(&self, client: Client) -> anyhow::Result<Client> {
        let mut inner = self.0.inner.write().await;
        inner.clients.insert(client.id.clone(), client.clone());
        self.0.persist(&inner).await;
        Ok(client)
    }

    async fn list(&self) -> anyhow::Result<Vec<Client>> {
        Ok(self.0.inner.read().await.clients.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        let mut inner = self.0.inner.write().await;
        inner.clients.remove(id);
        self.0.persist(&inner).await;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ClientStatus,
        device_info: Option<DeviceInfo>,
        last_seen_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut inner = self.0.inner.write().await;
        if let Some(client) = inner.clients.get_mut(id) {
            client.status = status;
            client.last_seen_at = last_seen_at;
            if let Some(info) = device_info {
                client.device_info = info;
            }
        }
        self.0.persist(&inner).await;
        Ok(())
    }
}

#[async_trait]
impl LayoutRepository for LayoutPort {
    async fn get(&self, id: &str) -> anyhow::Result<Option<Layout>> {
        Ok(self.0.inner.read().await.layouts.get(id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Layout>> {
        Ok(self.0.inner.read().await.layouts.values().cloned().collect())
    }
}

#[async_trait]
impl ScheduleRepository for SchedulePort {
    async fn list(&self) -> anyhow::Result<Vec<Schedule>> {
        Ok(self.0.inner.read().await.schedules.clone())
    }
}

#[async_trait]
impl TokenRepository for TokenPort {
    async fn get_by_fingerprint(&self, fingerprint: &str) -> anyhow::Result<Option<RegistrationToken>> {
        Ok(self.0.inner.read().await.tokens.get(fingerprint).cloned())
    }

    async fn check(
        &self,
        fingerprint: &str,
        mac_address: Option<&str>,
        group: Option<&str>,
        location: Option<&str>,
    ) -> anyhow::Result<ConsumeOutcome> {
        let inner = self.0.inner.read().await;
        let Some(token) = inner.tokens.get(fingerprint) else {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::NotFound));
        };

        if !token.is_active {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::Inactive));
        }
        if token.expires_at <= Utc::now() {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::Expired));
        }
        if token.used_count >= token.max_uses {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::Exhausted));
        }
        if let (Some(want), Some(have)) = (&token.restricted_to_group, group) {
            if want != have {
                return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::GroupMismatch));
            }
        }
        if let (Some(want), Some(have)) = (&token.restricted_to_location, location) {
            if want != have {
                return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::LocationMismatch));
            }
        }
        if let (Some(want), Some(have)) = (&token.restricted_to_mac, mac_address) {
            if want != have {
                return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::MacMismatch));
            }
        }

        Ok(ConsumeOutcome::Consumed(token.clone()))
    }

    async fn mark_used(&self, fingerprint: &str) -> anyhow::Result<ConsumeOutcome> {
        let mut inner = self.0.inner.write().await;
        let Some(token) = inner.tokens.get_mut(fingerprint) else {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::NotFound));
        };
        if token.used_count >= token.max_uses {
            return Ok(ConsumeOutcome::Rejected(TokenCheckFailure::Exhausted));
        }

        // Single critical section: re-check-then-increment under the same write
        // lock, so concurrent callers against the same token cannot both pass
        // the `used_count < max_uses` check before either commits.
        token.used_count += 1;
        let consumed = token.clone();
        self.0.persist(&inner).await;
        Ok(ConsumeOutcome::Consumed(consumed))
    }

    async fn delete(&self, fingerprint: &str) -> anyhow::Result<()> {
        let mut inner = self.0.inner.write().await;
        inner.tokens.remove(fingerprint);
        self.0.persist(&inner).await;
        Ok(())
    }
}

#[async_trait]
impl OperatorRepository for OperatorPort {
    async fn get(&self, id: &str) -> anyhow::Result<Option<OperatorRegistration>> {
        Ok(self.0.inner.read().await.operators.get(id).cloned())
    }

    async fn get_by_device_identifier(
        &self,
        app_id: &str,
    ) -> anyhow::Result<Option<OperatorRegistration>> {
        Ok(self
            .0
            .inner
            .read()
            .await
            .operators
            .values()
            .find(|o| o.device_identifier == app_id)
            .cloned())
    }

    async fn get_by_token_fingerprint(
        &self,
        fingerprint: &str,
    ) -> anyhow::Result<Option<OperatorRegistration>> {
        Ok(self
            .0
            .inner
            .read()
            .await
            .operators
            .values()
            .find(|o| o.token_fingerprint.as_deref() == Some(fingerprint))
            .cloned())
    }

    async fn update_last_seen(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut inner = self.0.inner.write().await;
        if let Some(op) = inner.operators.get_mut(id) {
            op.last_seen_at = Some(at);
        }
        self.0.persist(&inner).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
