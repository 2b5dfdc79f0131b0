use async_trait::async_trait;
use tracing::debug;
use weft_core::errors::Result;
use weft_core::protocol::{ClientMessage, DispatchEnvelope, DispatchReply};
use weft_core::{RequestId, SyncError};

use super::DispatchTransport;
use crate::connection::ConnectionManager;

/// Dispatches over the persistent connection as `emitEvent` frames.
///
/// The frame's `key` is the triggered action, its `data` the whole
/// envelope. Reply actions travel back in the acknowledgement.
pub struct SocketTransport {
    connection: ConnectionManager,
    object_id: String,
}

impl SocketTransport {
    /// Transport emitting events on `object_id` through `connection`.
    pub fn new(connection: ConnectionManager, object_id: impl Into<String>) -> Self {
        Self {
            connection,
            object_id: object_id.into(),
        }
    }
}

#[async_trait]
impl DispatchTransport for SocketTransport {
    async fn send(&self, envelope: DispatchEnvelope) -> Result<DispatchReply> {
        let Some(first) = envelope.events.first() else {
            return Err(SyncError::Transport("dispatch without events".into()));
        };
        let key = first.key.clone();
        let message = ClientMessage::EmitEvent {
            request_id: RequestId::new(),
            object_id: self.object_id.clone(),
            key,
            data: serde_json::to_value(&envelope)?,
        };
        let pending = self.connection.request(message)?;
        debug!(request_id = %pending.request_id(), object_id = %self.object_id, "event emitted");
        let ack = pending.wait().await?;
        Ok(DispatchReply::Actions(ack.actions))
    }
}
