// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the fleet controller.

use std::time::Duration;

/// Configuration for the signage control-plane server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "signaged", about = "Digital-signage fleet controller")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "SIGNAGE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8443, env = "SIGNAGE_PORT")]
    pub port: u16,

    /// Alternative ports to try, in order, if `port` is occupied.
    #[arg(long, value_delimiter = ',', env = "SIGNAGE_ALTERNATIVE_PORTS")]
    pub alternative_ports: Vec<u16>,

    /// Automatically fall back to `alternative_ports` on bind failure.
    #[arg(long, default_value_t = true, env = "SIGNAGE_AUTO_SELECT_PORT")]
    pub auto_select_port: bool,

    /// Must be true; the control plane is WSS-only.
    #[arg(long, default_value_t = true, env = "SIGNAGE_ENABLE_SSL")]
    pub enable_ssl: bool,

    /// Path to the PEM certificate chain.
    #[arg(long, env = "SIGNAGE_CERT_PATH")]
    pub certificate_path: Option<std::path::PathBuf>,

    /// Path to the PEM private key.
    #[arg(long, env = "SIGNAGE_KEY_PATH")]
    pub certificate_key_path: Option<std::path::PathBuf>,

    /// Upgrade endpoint path.
    #[arg(long, default_value = "/ws/", env = "SIGNAGE_ENDPOINT_PATH")]
    pub endpoint_path: String,

    /// Maximum accepted envelope size, in bytes.
    #[arg(long, default_value_t = 1024 * 1024, env = "SIGNAGE_MAX_MESSAGE_SIZE")]
    pub max_message_size: usize,

    /// Seconds of silence from a Client before it is demoted to `Offline`.
    #[arg(long, default_value_t = 90, env = "SIGNAGE_HEARTBEAT_TIMEOUT_SECS")]
    pub client_heartbeat_timeout_secs: u64,

    /// Scheduler tick interval, in seconds.
    #[arg(long, default_value_t = 60, env = "SIGNAGE_SCHEDULER_TICK_SECS")]
    pub scheduler_tick_interval_secs: u64,

    /// Liveness monitor scan interval, in seconds.
    #[arg(long, default_value_t = 30, env = "SIGNAGE_LIVENESS_CHECK_SECS")]
    pub liveness_check_interval_secs: u64,

    /// UDP port for the link-local broadcast discovery responder.
    #[arg(long, default_value_t = 5556, env = "SIGNAGE_DISCOVERY_PORT")]
    pub discovery_port: u16,

    /// Repository connection string (opaque to the core).
    #[arg(long, env = "SIGNAGE_CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Preferred network interface name for discovery advertisement.
    #[arg(long, env = "SIGNAGE_PREFERRED_INTERFACE")]
    pub preferred_network_interface: Option<String>,

    /// TTL for a pending screenshot request, in seconds.
    #[arg(long, default_value_t = 30, env = "SIGNAGE_SCREENSHOT_TIMEOUT_SECS")]
    pub screenshot_timeout_secs: u64,

    /// Stale-device threshold for the discovery janitor, in minutes.
    #[arg(long, default_value_t = 30, env = "SIGNAGE_DISCOVERY_STALE_MINUTES")]
    pub discovery_stale_minutes: u64,

    /// Bounded per-session outbound send queue length.
    #[arg(long, default_value_t = 256, env = "SIGNAGE_SEND_QUEUE_CAPACITY")]
    pub send_queue_capacity: usize,

    /// Protocol-error threshold per session per minute before disconnect.
    #[arg(long, default_value_t = 5, env = "SIGNAGE_PROTOCOL_ERROR_THRESHOLD")]
    pub protocol_error_threshold: u32,
}

impl ServerConfig {
    pub fn client_heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.client_heartbeat_timeout_secs)
    }

    pub fn scheduler_tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_tick_interval_secs)
    }

    pub fn liveness_check_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_check_interval_secs)
    }

    pub fn screenshot_timeout(&self) -> Duration {
        Duration::from_secs(self.screenshot_timeout_secs)
    }

    pub fn discovery_stale_threshold(&self) -> Duration {
        Duration::from_secs(self.discovery_stale_minutes * 60)
    }
}

#[cfg(test)]
impl ServerConfig {
    /// A config instance with every default value, for tests that need a
    /// `ServerConfig` but don't exercise `clap` parsing.
    pub fn for_test() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8443,
            alternative_ports: Vec::new(),
            auto_select_port: true,
            enable_ssl: true,
            certificate_path: None,
            certificate_key_path: None,
            endpoint_path: "/ws/".to_owned(),
            max_message_size: 1024 * 1024,
            client_heartbeat_timeout_secs: 90,
            scheduler_tick_interval_secs: 60,
            liveness_check_interval_secs: 30,
            discovery_port: 5556,
            connection_string: None,
            preferred_network_interface: None,
            screenshot_timeout_secs: 30,
            discovery_stale_minutes: 30,
            send_queue_capacity: 256,
            protocol_error_threshold: 5,
        }
    }
}
