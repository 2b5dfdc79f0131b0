//! `ConnectionManager`: owns the persistent server connection.
//!
//! # State machine
//!
//! ```text
//!              start()
//! Disconnected ───────► Connecting ──ok──► Connected
//!      ▲                  │   ▲               │
//!      │ fatal / stop()   │   │ delay         │ unexpected drop
//!      └──────────────────┤   └───────────────┘ (warn, no offline signal,
//!                         │                      waits in Connecting)
//!                         │ connectivity failure
//!                         ▼
//!                  RecoveringOffline ──delay──► Connecting
//! ```
//!
//! - A connectivity failure signals `has_internet = false` once; the first
//!   successful connect afterwards signals `has_internet = true` once.
//! - A non-connectivity failure reaches the error listeners and the loop
//!   retries after the same delay.
//! - A fatal failure (invalid endpoint) reaches the fatal listeners and the
//!   manager stops in `Disconnected`.
//! - After an unexpected drop the manager waits the reconnect delay in
//!   `Connecting`.
//!
//! # Outbound queues
//!
//! `emitEvent` frames go through a bounded queue and fail with a transport
//! error when it is full. `watch` and `unwatch` frames go through a separate
//! unbounded queue that the connection task drains first, so replaying a
//! large subscription set on connect never loses a frame.
//!
//! All frames from one connection are handled in arrival order on the
//! connection task. Listener callbacks run on that task, so they must not
//! block.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use weft_core::errors::Result;
use weft_core::listeners::ListenerRegistry;
use weft_core::protocol::{ClientMessage, ServerMessage};
use weft_core::SyncError;
use weft_settings::ConnectionSettings;

use crate::pending::{Ack, PendingAck, PendingRequests};
use crate::transport::{Connector, Duplex};

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not running, or stopped after a fatal error.
    Disconnected,
    /// A connect attempt is in progress or scheduled.
    Connecting,
    /// A connection is established.
    Connected,
    /// The host is unreachable; retrying at the reconnect delay.
    RecoveringOffline,
}

/// An object push received from the server.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectPush {
    /// `setObject`
    Set {
        /// Concrete identifier.
        id: String,
        /// New payload.
        data: Value,
    },
    /// `removeObject`
    Removed {
        /// Concrete identifier.
        id: String,
    },
}

/// Timing and capacity knobs.
///
/// [`ConnectionManager::new`] clamps a zero sweep interval or queue
/// capacity to the smallest usable value.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Fixed delay between attempts.
    pub reconnect_delay: Duration,
    /// Bound on one connect attempt.
    pub connect_timeout: Duration,
    /// Acknowledgement deadline.
    pub request_timeout: Duration,
    /// Pending-request sweep period.
    pub ack_sweep_interval: Duration,
    /// Capacity of the `emitEvent` queue.
    pub send_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from(&ConnectionSettings::default())
    }
}

impl From<&ConnectionSettings> for ConnectionConfig {
    fn from(settings: &ConnectionSettings) -> Self {
        Self {
            reconnect_delay: settings.reconnect_delay(),
            connect_timeout: settings.connect_timeout(),
            request_timeout: settings.request_timeout(),
            ack_sweep_interval: settings.ack_sweep_interval(),
            send_queue_capacity: settings.send_queue_capacity,
        }
    }
}

impl ConnectionConfig {
    const MIN_SWEEP: Duration = Duration::from_millis(1);

    fn sanitized(mut self) -> Self {
        if self.ack_sweep_interval.is_zero() {
            warn!(
                fallback = ?Self::MIN_SWEEP,
                "ack_sweep_interval must be non-zero, clamping"
            );
            self.ack_sweep_interval = Self::MIN_SWEEP;
        }
        if self.send_queue_capacity == 0 {
            warn!("send_queue_capacity must be non-zero, clamping to 1");
            self.send_queue_capacity = 1;
        }
        self
    }
}

/// Sends frames that expect an acknowledgement.
///
/// Implemented by [`ConnectionManager`]; the object store depends on this
/// seam rather than on the manager directly.
pub trait RequestSender: Send + Sync {
    /// Send `message` and return a handle resolving on its acknowledgement.
    fn request(&self, message: ClientMessage) -> Result<PendingAck>;
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Outbound {
    events: mpsc::Sender<String>,
    subscriptions: mpsc::UnboundedSender<String>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    outbound: Mutex<Option<Outbound>>,
    pending: PendingRequests,
    running: Mutex<Option<Running>>,
    generation: AtomicU64,
    state_changes: ListenerRegistry<ConnectionState>,
    messages: ListenerRegistry<ObjectPush>,
    connectivity: ListenerRegistry<bool>,
    errors: ListenerRegistry<SyncError>,
    fatal: ListenerRegistry<SyncError>,
    connected: ListenerRegistry<u64>,
}

/// Handle to the connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

enum SessionEnd {
    Cancelled,
    Dropped(String),
}

impl ConnectionManager {
    /// Create a stopped manager.
    pub fn new(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        let config = config.sanitized();
        let pending = PendingRequests::new(config.request_timeout);
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                outbound: Mutex::new(None),
                pending,
                running: Mutex::new(None),
                generation: AtomicU64::new(0),
                state_changes: ListenerRegistry::multi("connection.state"),
                messages: ListenerRegistry::multi("connection.messages"),
                connectivity: ListenerRegistry::multi("connection.connectivity"),
                errors: ListenerRegistry::multi("connection.errors"),
                fatal: ListenerRegistry::multi("connection.fatal"),
                connected: ListenerRegistry::multi("connection.connected"),
            }),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start connecting to `endpoint` in the background.
    ///
    /// A second call while running is a no-op. Must be called within a
    /// Tokio runtime.
    pub fn start(&self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        let mut running = self.inner.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            info!(endpoint, "connection manager already started");
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::clone(&self.inner), endpoint, cancel.clone()));
        *running = Some(Running { cancel, handle });
    }

    /// Stop the connection task and fail outstanding requests.
    pub async fn stop(&self) {
        let running = self.inner.running.lock().take();
        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "connection task ended abnormally");
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
        let _ = self.inner.pending.fail_all(&SyncError::ShutDown);
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Number of successful connects so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Relaxed)
    }

    // ─── Outbound ────────────────────────────────────────────────────────

    /// Queue `message` for sending without tracking its acknowledgement.
    pub fn send(&self, message: &ClientMessage) -> Result<()> {
        let frame = serde_json::to_string(message)
            .map_err(|e| SyncError::Transport(format!("failed to encode frame: {e}")))?;
        self.inner.enqueue(frame, message)
    }

    /// Send `message` and return a handle resolving on its acknowledgement.
    pub fn request(&self, message: ClientMessage) -> Result<PendingAck> {
        let ack = self.inner.pending.register(message.request_id().clone());
        if let Err(e) = self.send(&message) {
            self.inner.pending.forget(message.request_id());
            return Err(e);
        }
        Ok(ack)
    }

    /// Requests still waiting for an acknowledgement.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    // ─── Listener registries ─────────────────────────────────────────────

    /// Object pushes, in arrival order.
    pub fn on_message(&self) -> &ListenerRegistry<ObjectPush> {
        &self.inner.messages
    }

    /// `has_internet` transitions.
    pub fn on_connectivity_change(&self) -> &ListenerRegistry<bool> {
        &self.inner.connectivity
    }

    /// Non-fatal errors: failed connect attempts, unparseable frames,
    /// uncorrelated error acknowledgements.
    pub fn on_error(&self) -> &ListenerRegistry<SyncError> {
        &self.inner.errors
    }

    /// The error that stopped the manager.
    pub fn on_fatal_error(&self) -> &ListenerRegistry<SyncError> {
        &self.inner.fatal
    }

    /// Connection generation, emitted after every successful (re)connect
    /// once the outbound queue accepts frames.
    pub fn on_connected(&self) -> &ListenerRegistry<u64> {
        &self.inner.connected
    }

    /// Every state transition.
    pub fn on_state_change(&self) -> &ListenerRegistry<ConnectionState> {
        &self.inner.state_changes
    }
}

impl RequestSender for ConnectionManager {
    fn request(&self, message: ClientMessage) -> Result<PendingAck> {
        ConnectionManager::request(self, message)
    }
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        let changed = {
            let mut state = self.state.write();
            let changed = *state != next;
            *state = next;
            changed
        };
        if changed {
            debug!(state = ?next, "connection state changed");
            let _ = self.state_changes.emit(next);
        }
    }

    fn enqueue(&self, frame: String, message: &ClientMessage) -> Result<()> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(SyncError::NotConnected);
        };
        let queued = if message.is_subscription() {
            tx.subscriptions
                .send(frame)
                .map_err(|_| SyncError::NotConnected)
        } else {
            tx.events.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => SyncError::Transport("send queue full".into()),
                TrySendError::Closed(_) => SyncError::NotConnected,
            })
        };
        if queued.is_ok() {
            debug!(kind = message.kind(), request_id = %message.request_id(), "frame queued");
        }
        queued
    }

    async fn connect(&self, endpoint: &str) -> Result<Duplex> {
        let timeout = self.config.connect_timeout;
        tokio::time::timeout(timeout, self.connector.connect(endpoint))
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Connectivity(format!(
                    "connect timed out after {timeout:?}"
                )))
            })
    }

    /// Pump one established connection until it ends.
    async fn serve(&self, duplex: Duplex, cancel: &CancellationToken) -> SessionEnd {
        let Duplex {
            mut sink,
            mut stream,
        } = duplex;
        let (events, mut event_rx) = mpsc::channel::<String>(self.config.send_queue_capacity);
        let (subscriptions, mut subscription_rx) = mpsc::unbounded_channel::<String>();
        *self.outbound.lock() = Some(Outbound {
            events,
            subscriptions,
        });

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.connected.emit(generation);

        let mut sweep = tokio::time::interval(self.config.ack_sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let end = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = sink.close().await;
                    break SessionEnd::Cancelled;
                }
                Some(frame) = subscription_rx.recv() => {
                    if let Err(e) = sink.send(frame).await {
                        break SessionEnd::Dropped(e.to_string());
                    }
                }
                Some(frame) = event_rx.recv() => {
                    if let Err(e) = sink.send(frame).await {
                        break SessionEnd::Dropped(e.to_string());
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(e)) if e.is_connectivity() => break SessionEnd::Dropped(e.to_string()),
                    Some(Err(e)) => self.report_frame_error(e, None),
                    None => break SessionEnd::Dropped("closed by server".into()),
                },
                _ = sweep.tick() => {
                    let _ = self.pending.sweep_expired(Instant::now());
                }
            }
        };

        *self.outbound.lock() = None;
        end
    }

    fn handle_frame(&self, text: &str) {
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                self.report_frame_error(SyncError::MalformedMessage(e.to_string()), Some(text));
                return;
            }
        };
        match message {
            ServerMessage::SetObject { id, data } => {
                debug!(object_id = %id, "setObject received");
                let _ = self.messages.emit(ObjectPush::Set { id, data });
            }
            ServerMessage::RemoveObject { id } => {
                debug!(object_id = %id, "removeObject received");
                let _ = self.messages.emit(ObjectPush::Removed { id });
            }
            ServerMessage::Acknowledge {
                request_id,
                error,
                retry_after_seconds,
                actions,
            } => {
                let outcome = match error {
                    Some(message) => Err(SyncError::Application {
                        message,
                        retry_after: retry_after_seconds.map(Duration::from_secs),
                    }),
                    None => Ok(Ack { actions }),
                };
                match request_id {
                    Some(id) => {
                        if !self.pending.resolve(&id, outcome) {
                            warn!(request_id = %id, "acknowledgement for unknown request");
                        }
                    }
                    None => match outcome {
                        Err(err) => {
                            warn!(error = %err, "uncorrelated error acknowledgement");
                            let _ = self.errors.emit(err);
                        }
                        Ok(_) => warn!("acknowledgement without request id"),
                    },
                }
            }
        }
    }

    fn report_frame_error(&self, err: SyncError, frame: Option<&str>) {
        let preview: String = frame.unwrap_or_default().chars().take(200).collect();
        error!(error = %err, frame = %preview, "failed to parse server message");
        let _ = self.errors.emit(err);
    }
}

async fn run(inner: Arc<Inner>, endpoint: String, cancel: CancellationToken) {
    let mut offline = false;
    loop {
        inner.set_state(ConnectionState::Connecting);
        let attempt = tokio::select! {
            () = cancel.cancelled() => break,
            attempt = inner.connect(&endpoint) => attempt,
        };

        match attempt {
            Ok(duplex) => {
                inner.set_state(ConnectionState::Connected);
                info!(endpoint = %endpoint, "connected");
                if offline {
                    offline = false;
                    info!("connectivity restored");
                    let _ = inner.connectivity.emit(true);
                }
                match inner.serve(duplex, &cancel).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(reason) => {
                        warn!(reason = %reason, "connection dropped, reconnecting");
                        let failed = inner.pending.fail_all(&SyncError::ConnectionLost(reason));
                        if failed > 0 {
                            debug!(failed, "pending requests failed by disconnect");
                        }
                        inner.set_state(ConnectionState::Connecting);
                    }
                }
            }
            Err(err) if err.is_fatal() => {
                error!(endpoint = %endpoint, error = %err, "fatal connection error, stopping");
                inner.set_state(ConnectionState::Disconnected);
                let _ = inner.fatal.emit(err);
                return;
            }
            Err(err) if err.is_connectivity() => {
                inner.set_state(ConnectionState::RecoveringOffline);
                if offline {
                    debug!(error = %err, "still offline");
                } else {
                    offline = true;
                    warn!(error = %err, "server unreachable, going offline");
                    let _ = inner.connectivity.emit(false);
                }
            }
            Err(err) => {
                warn!(error = %err, kind = err.error_kind(), "connect attempt failed");
                let _ = inner.errors.emit(err);
            }
        }

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(inner.config.reconnect_delay) => {}
        }
    }
    inner.set_state(ConnectionState::Disconnected);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
