//! Acknowledgement correlation.
//!
//! Every outbound request registers a waiter keyed by its [`RequestId`]. The
//! waiter resolves when the matching `acknowledge` frame arrives, when its
//! deadline passes (swept periodically by the connection task), or when the
//! connection drops.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;
use weft_core::errors::Result;
use weft_core::protocol::ReplyAction;
use weft_core::{RequestId, SyncError};

/// Successful acknowledgement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ack {
    /// Reply actions carried by the acknowledgement.
    pub actions: Vec<ReplyAction>,
}

/// Handle to an outstanding request.
#[derive(Debug)]
pub struct PendingAck {
    request_id: RequestId,
    rx: oneshot::Receiver<Result<Ack>>,
}

impl PendingAck {
    /// Request this handle waits on.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Wait for the acknowledgement.
    pub async fn wait(self) -> Result<Ack> {
        self.rx.await.unwrap_or(Err(SyncError::ShutDown))
    }
}

struct Waiter {
    tx: oneshot::Sender<Result<Ack>>,
    deadline: Instant,
    timeout: Duration,
}

/// Outstanding requests keyed by id.
pub(crate) struct PendingRequests {
    timeout: Duration,
    waiters: Mutex<HashMap<RequestId, Waiter>>,
}

impl PendingRequests {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Register a waiter for `request_id`.
    pub(crate) fn register(&self, request_id: RequestId) -> PendingAck {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            tx,
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
        };
        let _ = self.waiters.lock().insert(request_id.clone(), waiter);
        PendingAck { request_id, rx }
    }

    /// Drop a waiter without resolving it.
    pub(crate) fn forget(&self, request_id: &RequestId) {
        let _ = self.waiters.lock().remove(request_id);
    }

    /// Resolve the waiter for `request_id`. Returns `false` if none exists.
    pub(crate) fn resolve(&self, request_id: &RequestId, outcome: Result<Ack>) -> bool {
        let Some(waiter) = self.waiters.lock().remove(request_id) else {
            return false;
        };
        // The receiver may have been dropped by a caller that stopped waiting.
        let _ = waiter.tx.send(outcome);
        true
    }

    /// Fail every waiter whose deadline is at or before `now`.
    pub(crate) fn sweep_expired(&self, now: Instant) -> usize {
        let expired: Vec<(RequestId, Waiter)> = {
            let mut waiters = self.waiters.lock();
            let ids: Vec<RequestId> = waiters
                .iter()
                .filter(|(_, w)| w.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| waiters.remove(&id).map(|w| (id, w)))
                .collect()
        };
        let count = expired.len();
        for (request_id, waiter) in expired {
            debug!(%request_id, "request timed out waiting for acknowledgement");
            let _ = waiter.tx.send(Err(SyncError::Timeout {
                request_id: request_id.into_inner(),
                after: waiter.timeout,
            }));
        }
        count
    }

    /// Fail every outstanding waiter with `err`.
    pub(crate) fn fail_all(&self, err: &SyncError) -> usize {
        let drained: Vec<Waiter> = self.waiters.lock().drain().map(|(_, w)| w).collect();
        let count = drained.len();
        for waiter in drained {
            let _ = waiter.tx.send(Err(err.clone()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.lock().len()
    }
}
