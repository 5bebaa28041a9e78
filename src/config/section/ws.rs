//! `[ws]` section configuration.
//!
//! ```toml
//! [ws]
//! max_clients = 50
//! send_timeout_ms = 1000
//! handshake_timeout_ms = 2000
//! max_frame_payload = 1048576
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ws::RegistryLimits;

/// WebSocket endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Concurrent live-reload clients.
    pub max_clients: usize,

    /// Bound on writing one frame to one client.
    pub send_timeout_ms: u64,

    /// Bound on writing the handshake response.
    pub handshake_timeout_ms: u64,

    /// Inbound payload bytes kept per frame; the rest is discarded.
    pub max_frame_payload: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_clients: 50,
            send_timeout_ms: 1000,
            handshake_timeout_ms: 2000,
            max_frame_payload: 1 << 20,
        }
    }
}

impl WsConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn limits(&self) -> RegistryLimits {
        RegistryLimits {
            capacity: self.max_clients,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            max_payload: self.max_frame_payload,
        }
    }
}
