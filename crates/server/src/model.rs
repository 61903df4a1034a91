// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable aggregates: `Client`, `Layout`, `Schedule`, `RegistrationToken`,
//! `OperatorRegistration`. These are owned by the Repository; the core only
//! ever holds copies or `Arc` snapshots of them.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Liveness/connectivity state of a `Client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum ClientStatus {
    Online,
    Offline,
    Error,
    #[default]
    Unknown,
}

/// Opaque device telemetry snapshot, last reported by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub screen_width: Option<u32>,
    #[serde(default)]
    pub screen_height: Option<u32>,
    #[serde(default)]
    pub cpu_percent: Option<f32>,
    #[serde(default)]
    pub memory_percent: Option<f32>,
    #[serde(default)]
    pub temperature_celsius: Option<f32>,
    /// Fields the core does not model explicitly but still forwards/stores.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A physical display endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub status: ClientStatus,
    pub last_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_layout_id: Option<String>,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Client {
    /// A freshly minted Client for first-time registration.
    pub fn new(id: String, mac_address: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            id,
            name: String::new(),
            mac_address,
            ip_address,
            hostname: None,
            group: None,
            location: None,
            status: ClientStatus::Unknown,
            last_seen_at: Utc::now(),
            assigned_layout_id: None,
            device_info: DeviceInfo::default(),
            metadata: HashMap::new(),
        }
    }

    /// `status == Online` is only trustworthy while `last_seen_at` is within `timeout`.
    pub fn is_live(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.status == ClientStatus::Online && now - self.last_seen_at <= timeout
    }
}

/// A displayable document. Opaque to the core beyond id/metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub resolution: Option<String>,
    /// Forwarded verbatim in `DisplayUpdate`; the core never interprets it.
    #[serde(default)]
    pub elements: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub version: u32,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// What a `Schedule` applies to: a single client, or a client group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScheduleTarget {
    Client(String),
    Group(String),
}

/// A time-window binding a `Layout` to a `Client` or group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub layout_id: String,
    pub target: ScheduleTarget,
    pub priority: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub days_of_week: Vec<Weekday>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub modified: DateTime<Utc>,
}

/// Admission credential for Clients. Stored by fingerprint only; the raw
/// token string never reaches durable storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
    pub used_count: u32,
    #[serde(default)]
    pub restricted_to_group: Option<String>,
    #[serde(default)]
    pub restricted_to_location: Option<String>,
    #[serde(default)]
    pub restricted_to_mac: Option<String>,
    pub is_active: bool,
}

/// Outcome of validating (and possibly consuming) a registration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheckFailure {
    NotFound,
    Inactive,
    Expired,
    Exhausted,
    GroupMismatch,
    LocationMismatch,
    MacMismatch,
}

impl TokenCheckFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "token not recognized",
            Self::Inactive => "token is inactive",
            Self::Expired => "token has expired",
            Self::Exhausted => "token has no uses remaining",
            Self::GroupMismatch => "token is restricted to a different group",
            Self::LocationMismatch => "token is restricted to a different location",
            Self::MacMismatch => "token is restricted to a different MAC address",
        }
    }
}

/// Operator permission grants. Subset of `{View, Control, Manage}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Permission {
    View,
    Control,
    Manage,
}

/// Lifecycle state of an `OperatorRegistration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OperatorStatus {
    Pending,
    Approved,
    Denied,
    Revoked,
}

/// A mobile/desktop operator session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorRegistration {
    pub id: String,
    pub device_identifier: String,
    pub status: OperatorStatus,
    #[serde(default)]
    pub token_fingerprint: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl OperatorRegistration {
    pub fn has_permission(&self, perm: Permission) -> bool {
        self.status == OperatorStatus::Approved && self.permissions.contains(&perm)
    }
}

/// Ephemeral finding from a LAN scan. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub ip_address: std::net::IpAddr,
    #[serde(default)]
    pub hostname: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub discovery_method: DiscoveryMethod,
    pub is_likely_candidate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DiscoveryMethod {
    Ping,
    TcpProbe,
    BroadcastReply,
}
