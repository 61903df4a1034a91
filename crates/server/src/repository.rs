// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Repository Port: the only place the core touches durable storage.
//!
//! Concrete stores (a relational database in production) implement
//! [`ClientRepository`], [`LayoutRepository`], [`ScheduleRepository`],
//! [`TokenRepository`], and [`OperatorRepository`]. [`mem::InMemoryRepository`]
//! is the in-process implementation used for development and tests.

pub mod mem;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Client, ClientStatus, DeviceInfo, Layout, OperatorRegistration, RegistrationToken, Schedule};

/// Outcome of an atomic validate-and-consume on a token.
#[derive(Debug, Clone)]
pub enum ConsumeOutcome {
    Consumed(RegistrationToken),
    Rejected(crate::model::TokenCheckFailure),
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn get(&self, id: &str) -> anyhow::Result<Option<Client>>;
    async fn get_by_mac(&self, mac: &str) -> anyhow::Result<Option<Client>>;
    async fn upsert(&self, client: Client) -> anyhow::Result<Client>;
    async fn list(&self) -> anyhow::Result<Vec<Client>>;
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
    async fn update_status(
        &self,
        id: &str,
        status: ClientStatus,
        device_info: Option<DeviceInfo>,
        last_seen_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait LayoutRepository: Send + Sync {
    async fn get(&self, id: &str) -> anyhow::Result<Option<Layout>>;
    async fn list(&self) -> anyhow::Result<Vec<Layout>>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn list(&self) -> anyhow::Result<Vec<Schedule>>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get_by_fingerprint(&self, fingerprint: &str) -> anyhow::Result<Option<RegistrationToken>>;
    /// Validate restrictions without mutating `used_count`. Callers that only
    /// want to know whether a token would be accepted — before committing
    /// whatever that acceptance is contingent on — use this; call
    /// [`TokenRepository::mark_used`] once that's committed.
    async fn check(
        &self,
        fingerprint: &str,
        mac_address: Option<&str>,
        group: Option<&str>,
        location: Option<&str>,
    ) -> anyhow::Result<ConsumeOutcome>;
    /// Atomically re-validate exhaustion and increment `used_count` in one
    /// critical section, so concurrent uses of the same token cannot both
    /// commit past `max_uses`.
    async fn mark_used(&self, fingerprint: &str) -> anyhow::Result<ConsumeOutcome>;
    async fn delete(&self, fingerprint: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait OperatorRepository: Send + Sync {
    async fn get(&self, id: &str) -> anyhow::Result<Option<OperatorRegistration>>;
    /// Look up the registration an `AppHeartbeat.AppId` identifies.
    async fn get_by_device_identifier(
        &self,
        app_id: &str,
    ) -> anyhow::Result<Option<OperatorRegistration>>;
    async fn get_by_token_fingerprint(
        &self,
        fingerprint: &str,
    ) -> anyhow::Result<Option<OperatorRegistration>>;
    async fn update_last_seen(&self, id: &str, at: DateTime<Utc>) -> anyhow::Result<()>;
}

/// The bundle of repository ports the control plane depends on.
pub struct Repository {
    pub clients: Box<dyn ClientRepository>,
    pub layouts: Box<dyn LayoutRepository>,
    pub schedules: Box<dyn ScheduleRepository>,
    pub tokens: Box<dyn TokenRepository>,
    pub operators: Box<dyn OperatorRepository>,
}
