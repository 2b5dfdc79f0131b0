//! Error hierarchy for the sync runtime.
//!
//! [`SyncError`] is the single error type shared by every component. Each
//! variant belongs to one class that decides how it propagates:
//!
//! - **Connectivity**: recoverable; drives the reconnect loop and the
//!   `has_internet` signal instead of reaching the UI as an error.
//! - **Protocol violation**: a client/server contract bug; always returned
//!   to the caller as a hard failure and logged at error level.
//! - **Application**: reported by the server or by local preconditions;
//!   surfaced to the caller, connection kept.
//! - **Fatal**: the runtime cannot continue with its current configuration.

use std::time::Duration;

/// Errors produced by the sync runtime.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SyncError {
    // Connectivity
    /// No connection is currently established.
    #[error("not connected")]
    NotConnected,
    /// The host could not be reached or the attempt timed out.
    #[error("connectivity failure: {0}")]
    Connectivity(String),
    /// An established connection dropped while the operation was pending.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// No acknowledgement arrived before the request deadline.
    #[error("request {request_id} timed out after {after:?}")]
    Timeout {
        /// Request that went unanswered.
        request_id: String,
        /// Configured deadline.
        after: Duration,
    },

    // Protocol violation
    /// A reply referenced an action key with no registered listener.
    #[error("reply references unregistered action {key}")]
    UnknownAction {
        /// Joined key path from the reply.
        key: String,
    },
    /// A payload from the server could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    // Application
    /// The server rejected the request.
    #[error("server rejected request: {message}")]
    Application {
        /// Server-provided reason.
        message: String,
        /// Server-suggested delay before retrying.
        retry_after: Option<Duration>,
    },
    /// The action is unbound or sits under a blocked scope.
    #[error("action {full_id} is disabled")]
    ActionDisabled {
        /// Full id of the refused dispatch.
        full_id: String,
    },
    /// A single-listener slot is already taken by another listener.
    #[error("listener conflict on {target}: {existing} is already registered")]
    ListenerConflict {
        /// The slot (registry name or identifier) being registered.
        target: String,
        /// The listener currently holding it.
        existing: String,
    },
    /// A subscription pattern is not usable.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Any other transport-level failure (handshake rejected, send failure).
    #[error("transport error: {0}")]
    Transport(String),

    // Fatal
    /// The configured endpoint cannot ever be connected to.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it is unusable.
        reason: String,
    },
    /// Client settings failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The runtime was stopped while the operation was pending.
    #[error("runtime shut down")]
    ShutDown,
}

impl SyncError {
    /// Whether this error means the server is unreachable right now.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Connectivity(_) | Self::ConnectionLost(_) | Self::Timeout { .. }
        )
    }

    /// Whether this error signals a client/server contract mismatch.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::UnknownAction { .. } | Self::MalformedMessage(_))
    }

    /// Whether the runtime cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidEndpoint { .. } | Self::InvalidConfig(_) | Self::ShutDown
        )
    }

    /// Server-suggested delay before retrying, if any.
    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::Application { retry_after, .. } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::Connectivity(_) => "connectivity",
            Self::ConnectionLost(_) => "connection_lost",
            Self::Timeout { .. } => "timeout",
            Self::UnknownAction { .. } => "unknown_action",
            Self::MalformedMessage(_) => "malformed_message",
            Self::Application { .. } => "application",
            Self::ActionDisabled { .. } => "action_disabled",
            Self::ListenerConflict { .. } => "listener_conflict",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::Transport(_) => "transport",
            Self::InvalidEndpoint { .. } => "invalid_endpoint",
            Self::InvalidConfig(_) => "invalid_config",
            Self::ShutDown => "shut_down",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

/// Result type for sync runtime operations.
pub type Result<T> = std::result::Result<T, SyncError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
