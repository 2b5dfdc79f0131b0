//! Wire types exchanged with the server.
//!
//! Socket frames are JSON objects discriminated by `type` with camelCase
//! fields. HTTP dispatch posts a [`DispatchEnvelope`] and reads back a
//! [`DispatchReply`].

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{RequestId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Action keys and scope frames
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies a server-defined operation by path.
///
/// The optional label is for diagnostics only; equality, hashing and the
/// wire form use the path alone.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ActionKey {
    path: Vec<String>,
    label: Option<String>,
}

impl ActionKey {
    /// Key from path segments.
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            label: None,
        }
    }

    /// Attach a debug label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Path segments.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Segments joined with `.`, used in logs and full ids.
    pub fn joined(&self) -> String {
        self.path.join(".")
    }
}

impl PartialEq for ActionKey {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Hash for ActionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl From<Vec<String>> for ActionKey {
    fn from(path: Vec<String>) -> Self {
        Self { path, label: None }
    }
}

impl From<ActionKey> for Vec<String> {
    fn from(key: ActionKey) -> Self {
        key.path
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({label})", self.joined()),
            None => f.write_str(&self.joined()),
        }
    }
}

/// One level of a dispatch chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScopeFrame {
    /// Action or scope key.
    pub key: ActionKey,
    /// Value carried by this level; sent as `null` when absent.
    #[serde(default)]
    pub payload: Option<Value>,
}

impl ScopeFrame {
    /// Frame with a payload.
    pub fn new(key: ActionKey, payload: Option<Value>) -> Self {
        Self { key, payload }
    }
}

/// Body of an HTTP dispatch. Frames are ordered innermost first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEnvelope {
    /// Session of the dispatching client.
    pub session_id: SessionId,
    /// Triggered action followed by its enclosing scopes.
    pub events: Vec<ScopeFrame>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Replies
// ─────────────────────────────────────────────────────────────────────────────

/// A plain reply action routed to the callback registered for `key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyAction {
    /// Target key path.
    pub key: ActionKey,
    /// Action argument.
    #[serde(default)]
    pub data: Value,
}

/// Severity of a [`Notice`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Informational.
    #[default]
    Info,
    /// Something degraded.
    Warning,
    /// Something failed.
    Error,
}

/// Transient user-visible message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    #[serde(default)]
    pub level: NoticeLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notice {
    /// Informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    /// Error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Server-pushed UI change, tagged by `strategy`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy")]
pub enum UpdateAction {
    /// Show a transient notice.
    AddNotice {
        /// Severity.
        #[serde(default)]
        level: NoticeLevel,
        /// Text.
        message: String,
    },
    /// Replace the whole rendered tree.
    FullUpdate {
        /// New root description.
        root: Value,
    },
    /// Patch one identified component.
    ComponentUpdate {
        /// Component identifier.
        identifier: u64,
        /// Patch payload.
        patch: Value,
    },
}

/// Body returned from a dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DispatchReply {
    /// Key-addressed actions.
    Actions(Vec<ReplyAction>),
    /// Strategy-tagged UI updates.
    Updates(Vec<UpdateAction>),
}

impl Default for DispatchReply {
    fn default() -> Self {
        Self::Actions(Vec::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Socket frames
// ─────────────────────────────────────────────────────────────────────────────

/// Client → server socket frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Start receiving pushes for an identifier or pattern.
    Watch {
        /// Correlates the acknowledgement.
        request_id: RequestId,
        /// Identifier or pattern.
        object_id: String,
    },
    /// Stop receiving pushes.
    Unwatch {
        /// Correlates the acknowledgement.
        request_id: RequestId,
        /// Identifier or pattern.
        object_id: String,
    },
    /// Deliver a dispatch over the socket.
    EmitEvent {
        /// Correlates the acknowledgement.
        request_id: RequestId,
        /// Object receiving the event.
        object_id: String,
        /// Triggered key path.
        key: ActionKey,
        /// Event data (the dispatch envelope).
        data: Value,
    },
}

impl ClientMessage {
    /// `watch` with a fresh request id.
    pub fn watch(object_id: impl Into<String>) -> Self {
        Self::Watch {
            request_id: RequestId::new(),
            object_id: object_id.into(),
        }
    }

    /// `unwatch` with a fresh request id.
    pub fn unwatch(object_id: impl Into<String>) -> Self {
        Self::Unwatch {
            request_id: RequestId::new(),
            object_id: object_id.into(),
        }
    }

    /// Request id carried by this frame.
    pub fn request_id(&self) -> &RequestId {
        match self {
            Self::Watch { request_id, .. }
            | Self::Unwatch { request_id, .. }
            | Self::EmitEvent { request_id, .. } => request_id,
        }
    }

    /// Whether this frame changes the server-side subscription set.
    pub fn is_subscription(&self) -> bool {
        matches!(self, Self::Watch { .. } | Self::Unwatch { .. })
    }

    /// Wire name of the frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Watch { .. } => "watch",
            Self::Unwatch { .. } => "unwatch",
            Self::EmitEvent { .. } => "emitEvent",
        }
    }
}

/// Server → client socket frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Create or overwrite an object.
    SetObject {
        /// Concrete identifier.
        id: String,
        /// Object payload.
        data: Value,
    },
    /// Delete an object.
    RemoveObject {
        /// Concrete identifier.
        id: String,
    },
    /// Result of an earlier request.
    Acknowledge {
        /// Request being acknowledged.
        #[serde(default)]
        request_id: Option<RequestId>,
        /// Server-side failure reason.
        #[serde(default)]
        error: Option<String>,
        /// Suggested retry delay on failure.
        #[serde(default)]
        retry_after_seconds: Option<u64>,
        /// Reply actions for a socket dispatch.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        actions: Vec<ReplyAction>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
