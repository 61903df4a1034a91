// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope types (spec.md §6). All are JSON objects tagged by `type`,
//! with `PascalCase` field casing matched verbatim on ingest and egress.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::DeviceInfo;

/// Every inbound/outbound message on the control-plane WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    Register(Register),
    RegistrationResponse(RegistrationResponse),
    Heartbeat(Heartbeat),
    DisplayUpdate(DisplayUpdate),
    Command(CommandEnvelope),
    Screenshot(Screenshot),
    AppHeartbeat(AppHeartbeat),
    RequestClientList(RequestClientList),
    ClientListUpdate(ClientListUpdate),
    RequestLayoutList(RequestLayoutList),
    LayoutListResponse(LayoutListResponse),
    SendCommand(SendCommand),
    AssignLayout(AssignLayout),
    RequestScreenshot(RequestScreenshot),
    ScreenshotResult(ScreenshotResult),
    CommandResult(CommandResult),
    Error(ErrorEnvelope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RegistrationStatus {
    Accepted,
    Rejected,
    Pending,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteCommand {
    Restart,
    RestartApp,
    ScreenOn,
    ScreenOff,
    SetVolume,
    Screenshot,
    ClearCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientListFilter {
    #[default]
    All,
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Register {
    #[serde(default)]
    pub client_id: Option<String>,
    pub mac_address: String,
    pub ip_address: String,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub registration_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationResponse {
    pub status: RegistrationStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_layout_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Heartbeat {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub offline: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayUpdate {
    pub layout_id: String,
    pub elements: Value,
    #[serde(default)]
    pub data_bindings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandEnvelope {
    pub command: RemoteCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Screenshot {
    pub client_id: String,
    pub image_data: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppHeartbeat {
    pub app_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestClientList {
    #[serde(default)]
    pub filter: ClientListFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
    pub status: crate::model::ClientStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_layout_id: Option<String>,
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientListUpdate {
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestLayoutList {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayoutInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayoutListResponse {
    pub layouts: Vec<LayoutInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendCommand {
    pub target_device_id: String,
    pub command: RemoteCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignLayout {
    pub device_id: String,
    pub layout_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestScreenshot {
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScreenshotResult {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommandResult {
    pub device_id: String,
    pub command: RemoteCommand,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
}

impl Envelope {
    pub fn error(err: crate::error::ServerError, message: impl Into<String>) -> Self {
        Envelope::Error(ErrorEnvelope { code: err.code().to_owned(), message: message.into() })
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
