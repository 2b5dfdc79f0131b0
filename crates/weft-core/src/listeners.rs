//! `ListenerRegistry<T>`: a typed pub/sub cell with last-value caching.
//!
//! Every component routes values to local callbacks through this primitive:
//! object store subscriptions, action status, surgical updates, connection
//! events. Two modes share the same storage semantics:
//!
//! - [`ListenerMode::Multi`]: any number of listeners, each keyed by a
//!   [`ListenerId`]. Re-registering an id replaces its callback.
//! - [`ListenerMode::Single`]: at most one live listener. Registering a
//!   second, different id fails with [`SyncError::ListenerConflict`];
//!   [`ListenerRegistry::replace`] swaps the listener explicitly.
//!
//! The last emitted value is kept so late subscribers can read the current
//! state ([`ListenerRegistry::current`]) or receive it on registration
//! ([`ListenerRegistry::listen_with_current`]).
//!
//! Emission snapshots the listener list and releases the state lock before
//! any callback runs, so callbacks may add or remove listeners reentrantly.
//! A listener removed during an emission still receives that emission.
//!
//! Deliveries on one registry are serialized by a reentrant delivery lock.
//! [`ListenerRegistry::emit_with`] produces its value while holding that
//! lock, so when several threads race the last delivery always carries the
//! value read last. Callbacks may emit on the same registry from the same
//! thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use crate::errors::{Result, SyncError};
use crate::ids::ListenerId;

/// Callback type stored by a registry.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

/// How many listeners a registry accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerMode {
    /// Exactly one live listener.
    Single,
    /// Any number of concurrent listeners.
    Multi,
}

struct RegistryState<T> {
    listeners: Vec<(ListenerId, Arc<ListenerFn<T>>)>,
    last: Option<T>,
}

/// Typed listener registry with last-value caching.
pub struct ListenerRegistry<T> {
    name: String,
    mode: ListenerMode,
    state: Mutex<RegistryState<T>>,
    delivery: ReentrantMutex<()>,
    unheard: AtomicU64,
}

impl<T: Clone> ListenerRegistry<T> {
    /// Create a registry in the given mode. `name` labels diagnostics.
    pub fn new(name: impl Into<String>, mode: ListenerMode) -> Self {
        Self {
            name: name.into(),
            mode,
            state: Mutex::new(RegistryState {
                listeners: Vec::new(),
                last: None,
            }),
            delivery: ReentrantMutex::new(()),
            unheard: AtomicU64::new(0),
        }
    }

    /// Registry accepting any number of listeners.
    pub fn multi(name: impl Into<String>) -> Self {
        Self::new(name, ListenerMode::Multi)
    }

    /// Registry accepting exactly one listener.
    pub fn single(name: impl Into<String>) -> Self {
        Self::new(name, ListenerMode::Single)
    }

    /// Diagnostic label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry mode.
    pub fn mode(&self) -> ListenerMode {
        self.mode
    }

    /// Register `callback` under `id`.
    pub fn listen(
        &self,
        id: ListenerId,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<()> {
        self.insert(id, Arc::new(callback))
    }

    /// Register `callback` and immediately hand it the cached value, if any.
    pub fn listen_with_current(
        &self,
        id: ListenerId,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Result<()> {
        let _delivery = self.delivery.lock();
        let callback: Arc<ListenerFn<T>> = Arc::new(callback);
        self.insert(id, Arc::clone(&callback))?;
        if let Some(value) = self.current() {
            callback(&value);
        }
        Ok(())
    }

    /// Hand the listener `id` a value produced under the delivery lock,
    /// without caching it. Returns `false` if `id` is not registered.
    pub fn deliver_to(&self, id: &ListenerId, produce: impl FnOnce() -> T) -> bool {
        let _delivery = self.delivery.lock();
        let callback = self
            .state
            .lock()
            .listeners
            .iter()
            .find(|(lid, _)| lid == id)
            .map(|(_, cb)| Arc::clone(cb));
        let Some(callback) = callback else {
            return false;
        };
        callback(&produce());
        true
    }

    fn insert(&self, id: ListenerId, callback: Arc<ListenerFn<T>>) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(slot) = state.listeners.iter_mut().find(|(lid, _)| *lid == id) {
            slot.1 = callback;
            return Ok(());
        }
        if self.mode == ListenerMode::Single {
            if let Some((existing, _)) = state.listeners.first() {
                return Err(SyncError::ListenerConflict {
                    target: self.name.clone(),
                    existing: existing.to_string(),
                });
            }
        }
        state.listeners.push((id, callback));
        Ok(())
    }

    /// Drop every listener and install `callback` under `id`.
    ///
    /// Returns the ids that were displaced.
    pub fn replace(
        &self,
        id: ListenerId,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> Vec<ListenerId> {
        let mut state = self.state.lock();
        let displaced = state
            .listeners
            .drain(..)
            .map(|(lid, _)| lid)
            .filter(|lid| *lid != id)
            .collect();
        state.listeners.push((id, Arc::new(callback)));
        displaced
    }

    /// Remove the listener identified by `id`.
    ///
    /// Returns `false` if it was not registered (safe to call repeatedly).
    pub fn remove(&self, id: &ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| lid != id);
        state.listeners.len() != before
    }

    /// Cache `value` and deliver it to every current listener.
    ///
    /// Returns how many listeners were called. Zero is not an error but is
    /// counted in [`unheard_emits`](Self::unheard_emits).
    pub fn emit(&self, value: T) -> usize {
        self.emit_with(|| value)
    }

    /// Like [`emit`](Self::emit), but `produce` runs under the delivery
    /// lock. Use it when the value is read from shared state that other
    /// threads may change between the read and the delivery.
    pub fn emit_with(&self, produce: impl FnOnce() -> T) -> usize {
        let _delivery = self.delivery.lock();
        let value = produce();
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let mut state = self.state.lock();
            state.last = Some(value.clone());
            state.listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        if snapshot.is_empty() {
            let _ = self.unheard.fetch_add(1, Ordering::Relaxed);
            debug!(registry = %self.name, "emit with no active listeners");
            return 0;
        }
        for cb in &snapshot {
            cb(&value);
        }
        snapshot.len()
    }

    /// Last emitted value.
    pub fn current(&self) -> Option<T> {
        self.state.lock().last.clone()
    }

    /// Forget the cached value without notifying anyone.
    pub fn clear_current(&self) {
        self.state.lock().last = None;
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ListenerId) -> bool {
        self.state.lock().listeners.iter().any(|(lid, _)| lid == id)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many emissions reached no listener.
    pub fn unheard_emits(&self) -> u64 {
        self.unheard.load(Ordering::Relaxed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
