//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only needs the fields it changes.

mod connection;
mod dispatch;
mod logging;

pub use connection::*;
pub use dispatch::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a weft client.
///
/// ```json
/// {
///   "connection": { "endpoint": "wss://example.com/socket", "reconnectDelayMs": 5000 },
///   "dispatch": { "url": "https://example.com/dispatch" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Persistent socket connection.
    pub connection: ConnectionSettings,
    /// Action dispatch transport.
    pub dispatch: DispatchSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl ClientSettings {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.connection.endpoint.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "connection.endpoint must not be empty".into(),
            ));
        }
        if self.connection.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "connection.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.connection.ack_sweep_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "connection.ackSweepIntervalMs must be at least 1".into(),
            ));
        }
        if self.dispatch.event_object_id.is_empty() {
            return Err(SettingsError::InvalidValue(
                "dispatch.eventObjectId must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
