use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persistent socket connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint: String,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay_ms: u64,
    /// Upper bound on a single connect attempt.
    pub connect_timeout_ms: u64,
    /// Deadline for a request's acknowledgement.
    pub request_timeout_ms: u64,
    /// How often expired acknowledgements are swept.
    pub ack_sweep_interval_ms: u64,
    /// Capacity of the outbound frame queue.
    pub send_queue_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080/socket".to_string(),
            reconnect_delay_ms: 3_000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            ack_sweep_interval_ms: 1_000,
            send_queue_capacity: 256,
        }
    }
}

impl ConnectionSettings {
    /// [`reconnect_delay_ms`](Self::reconnect_delay_ms) as a `Duration`.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// [`connect_timeout_ms`](Self::connect_timeout_ms) as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// [`request_timeout_ms`](Self::request_timeout_ms) as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// [`ack_sweep_interval_ms`](Self::ack_sweep_interval_ms) as a `Duration`.
    pub fn ack_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.ack_sweep_interval_ms)
    }
}
