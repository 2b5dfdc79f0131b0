use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP verb used for dispatch requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchMethod {
    /// `POST`
    #[default]
    Post,
    /// `PUT`
    Put,
}

impl DispatchMethod {
    /// Parse a verb case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// Action dispatch settings.
///
/// With a `url`, dispatches go over HTTP; without one they are sent as
/// `emitEvent` frames on the socket addressed to `event_object_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchSettings {
    /// HTTP dispatch endpoint.
    pub url: Option<String>,
    /// HTTP verb.
    pub method: DispatchMethod,
    /// Header carrying the session id.
    pub session_header: String,
    /// Object id addressed by socket dispatches.
    pub event_object_id: String,
    /// Overall HTTP request timeout.
    pub http_timeout_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            url: None,
            method: DispatchMethod::Post,
            session_header: "X-Session-Id".to_string(),
            event_object_id: "events".to_string(),
            http_timeout_ms: 30_000,
        }
    }
}

impl DispatchSettings {
    /// [`http_timeout_ms`](Self::http_timeout_ms) as a `Duration`.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}
