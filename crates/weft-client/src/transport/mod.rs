//! Transport seams.
//!
//! - [`Connector`] opens the persistent duplex channel the
//!   [`ConnectionManager`](crate::connection::ConnectionManager) drives.
//!   [`WebSocketConnector`] is the production implementation.
//! - [`DispatchTransport`] performs one request/response dispatch.
//!   [`HttpTransport`] posts to an HTTP endpoint; [`SocketTransport`] sends
//!   an `emitEvent` frame and waits for its acknowledgement.
//!
//! Both traits exist so tests can substitute in-memory channels.

mod http;
mod socket;
mod websocket;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};
use weft_core::errors::Result;
use weft_core::protocol::{DispatchEnvelope, DispatchReply};
use weft_core::SyncError;

pub use http::{HttpTransport, parse_retry_after};
pub use socket::SocketTransport;
pub use websocket::WebSocketConnector;

/// Outbound half of a connection: accepts serialized text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = SyncError> + Send>>;

/// Inbound half of a connection: yields text frames until the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An established bidirectional connection.
pub struct Duplex {
    /// Frames to the server.
    pub sink: FrameSink,
    /// Frames from the server.
    pub stream: FrameStream,
}

impl Duplex {
    /// Wrap any sink/stream pair.
    pub fn new(
        sink: impl Sink<String, Error = SyncError> + Send + 'static,
        stream: impl Stream<Item = Result<String>> + Send + 'static,
    ) -> Self {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

/// Opens persistent connections.
///
/// Implementations classify failures: unreachable hosts and I/O errors are
/// [`SyncError::Connectivity`], an endpoint that can never work is
/// [`SyncError::InvalidEndpoint`], anything else is
/// [`SyncError::Transport`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connect to `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<Duplex>;
}

/// Sends a dispatch envelope and returns the server's reply.
#[async_trait]
pub trait DispatchTransport: Send + Sync + 'static {
    /// Deliver `envelope`.
    async fn send(&self, envelope: DispatchEnvelope) -> Result<DispatchReply>;
}
