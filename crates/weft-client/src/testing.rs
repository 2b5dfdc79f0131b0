//! In-memory doubles for exercising the runtime without a network.
//!
//! - [`MockConnector`] plays a scripted sequence of connect outcomes and
//!   hands out a [`MockServer`] for every accepted connection.
//! - [`RecordingSender`] records subscription frames for store tests.
//! - [`RecordingPresenter`] records everything shown to the user.
//! - [`StaticTransport`] answers every dispatch with a canned reply.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::Mutex;
use serde_json::Value;
use weft_core::errors::Result;
use weft_core::protocol::{ClientMessage, DispatchEnvelope, DispatchReply, Notice};
use weft_core::SyncError;

use crate::connection::RequestSender;
use crate::pending::{PendingAck, PendingRequests};
use crate::presenter::Presenter;
use crate::transport::{Connector, DispatchTransport, Duplex};

// ─────────────────────────────────────────────────────────────────────────────
// Connector
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one scripted connect attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Connection established.
    Accept,
    /// Host unreachable (connectivity failure).
    Refuse,
    /// Handshake rejected (transport failure).
    Reject,
    /// Endpoint unusable (fatal).
    Fatal,
}

/// Connector replaying a script. Attempts past the end of the script are
/// refused.
pub struct MockConnector {
    steps: Mutex<VecDeque<Step>>,
    servers: Mutex<Vec<MockServer>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    /// Connector that plays `steps` in order.
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            servers: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        })
    }

    /// Connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Server side of the `index`-th accepted connection.
    ///
    /// # Panics
    ///
    /// Panics if fewer connections were accepted.
    pub fn server(&self, index: usize) -> MockServer {
        self.servers.lock()[index].clone()
    }

    /// Number of accepted connections.
    pub fn accepted(&self) -> usize {
        self.servers.lock().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &str) -> Result<Duplex> {
        let _ = self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front().unwrap_or(Step::Refuse);
        match step {
            Step::Accept => {
                let (server, duplex) = MockServer::pair();
                self.servers.lock().push(server);
                Ok(duplex)
            }
            Step::Refuse => Err(SyncError::Connectivity(format!("{endpoint}: connection refused"))),
            Step::Reject => Err(SyncError::Transport("handshake rejected with status 403".into())),
            Step::Fatal => Err(SyncError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "unsupported scheme".into(),
            }),
        }
    }
}

/// Server end of an in-memory connection.
#[derive(Clone)]
pub struct MockServer {
    to_client: mpsc::UnboundedSender<Result<String>>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    fn pair() -> (Self, Duplex) {
        let (to_client, from_server) = mpsc::unbounded();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = futures::sink::unfold(
            Arc::clone(&received),
            |log: Arc<Mutex<Vec<String>>>, frame: String| async move {
                log.lock().push(frame);
                Ok::<_, SyncError>(log)
            },
        );
        (Self { to_client, received }, Duplex::new(sink, from_server))
    }

    /// Send a JSON frame to the client.
    pub fn push(&self, frame: Value) {
        self.push_raw(&frame.to_string());
    }

    /// Send a raw text frame to the client.
    pub fn push_raw(&self, frame: &str) {
        let _ = self.to_client.unbounded_send(Ok(frame.to_string()));
    }

    /// Acknowledge `request_id` successfully.
    pub fn ack(&self, request_id: &str) {
        self.push(serde_json::json!({"type": "acknowledge", "requestId": request_id}));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        self.to_client.close_channel();
    }

    /// Frames the client sent, parsed as JSON.
    pub fn sent(&self) -> Vec<Value> {
        self.received
            .lock()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// Sent frames whose `type` is `kind`.
    pub fn sent_of_type(&self, kind: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["type"] == kind)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request sender
// ─────────────────────────────────────────────────────────────────────────────

/// Records `(kind, object_id)` for every frame it accepts.
pub struct RecordingSender {
    connected: AtomicBool,
    frames: Mutex<Vec<ClientMessage>>,
    pending: PendingRequests,
}

impl RecordingSender {
    /// Sender that accepts frames.
    pub fn connected() -> Self {
        Self::with_state(true)
    }

    /// Sender that rejects frames with [`SyncError::NotConnected`].
    pub fn disconnected() -> Self {
        Self::with_state(false)
    }

    fn with_state(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            frames: Mutex::new(Vec::new()),
            pending: PendingRequests::new(Duration::from_secs(30)),
        }
    }

    /// Flip connectivity.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Accepted frames as `(kind, object_id)`.
    pub fn kinds(&self) -> Vec<(String, String)> {
        self.frames
            .lock()
            .iter()
            .map(|frame| {
                let object_id = match frame {
                    ClientMessage::Watch { object_id, .. }
                    | ClientMessage::Unwatch { object_id, .. }
                    | ClientMessage::EmitEvent { object_id, .. } => object_id.clone(),
                };
                (frame.kind().to_string(), object_id)
            })
            .collect()
    }

    /// Accepted frames of `kind`.
    pub fn count(&self, kind: &str) -> usize {
        self.frames.lock().iter().filter(|f| f.kind() == kind).count()
    }
}

impl RequestSender for RecordingSender {
    fn request(&self, message: ClientMessage) -> Result<PendingAck> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        let ack = self.pending.register(message.request_id().clone());
        self.frames.lock().push(message);
        Ok(ack)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Presenter
// ─────────────────────────────────────────────────────────────────────────────

/// Records notices, root replacements and connectivity changes.
#[derive(Default)]
pub struct RecordingPresenter {
    notices: Mutex<Vec<Notice>>,
    roots: Mutex<Vec<Value>>,
    connectivity: Mutex<Vec<bool>>,
}

impl RecordingPresenter {
    /// Notices shown so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Roots rendered so far.
    pub fn roots(&self) -> Vec<Value> {
        self.roots.lock().clone()
    }

    /// Connectivity changes shown so far.
    pub fn connectivity(&self) -> Vec<bool> {
        self.connectivity.lock().clone()
    }
}

impl Presenter for RecordingPresenter {
    fn notice(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    fn full_update(&self, root: Value) {
        self.roots.lock().push(root);
    }

    fn connectivity_changed(&self, has_internet: bool) {
        self.connectivity.lock().push(has_internet);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatch transport
// ─────────────────────────────────────────────────────────────────────────────

/// Answers every dispatch with a fixed result and records the envelopes.
pub struct StaticTransport {
    reply: Mutex<Result<DispatchReply>>,
    envelopes: Mutex<Vec<DispatchEnvelope>>,
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl StaticTransport {
    /// Transport replying with `reply`.
    pub fn replying(reply: Result<DispatchReply>) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            envelopes: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Transport that holds every dispatch until `gate` is notified.
    pub fn gated(reply: Result<DispatchReply>, gate: Arc<tokio::sync::Notify>) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            envelopes: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    /// Change the reply for later dispatches.
    pub fn set_reply(&self, reply: Result<DispatchReply>) {
        *self.reply.lock() = reply;
    }

    /// Envelopes received so far.
    pub fn envelopes(&self) -> Vec<DispatchEnvelope> {
        self.envelopes.lock().clone()
    }
}

#[async_trait]
impl DispatchTransport for StaticTransport {
    async fn send(&self, envelope: DispatchEnvelope) -> Result<DispatchReply> {
        self.envelopes.lock().push(envelope);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.reply.lock().clone()
    }
}
