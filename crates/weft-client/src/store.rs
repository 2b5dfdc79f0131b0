//! `ObjectStore`: local cache of watched remote objects.
//!
//! Each distinct pattern is one subscription with a reference count and a
//! listener registry. The first local listener on a pattern sends `watch`;
//! the last one leaving sends `unwatch` and evicts cached objects no other
//! subscription still matches.
//!
//! Exact patterns resolve by direct map lookup. Wildcard patterns scan the
//! cached identifiers, narrowed to the pattern's literal prefix. The scan
//! counter exposes how often that happens.
//!
//! Desired subscriptions live here independently of the connection;
//! [`ObjectStore::resubscribe_all`] replays them after every (re)connect.
//!
//! Snapshots are read from the cache while the subscription registry's
//! delivery lock is held, so a listener's last snapshot always reflects the
//! latest cache state even when pushes race a new `watch`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};
use weft_core::errors::Result;
use weft_core::listeners::ListenerRegistry;
use weft_core::path::{self, ObjectPattern};
use weft_core::protocol::ClientMessage;
use weft_core::ListenerId;

use crate::connection::{ObjectPush, RequestSender};
use crate::pending::PendingAck;

type Snapshot = Vec<Value>;

struct Subscription {
    pattern: ObjectPattern,
    ref_count: usize,
    registry: Arc<ListenerRegistry<Snapshot>>,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<String, Value>,
    subscriptions: HashMap<String, Subscription>,
    wildcard_patterns: BTreeSet<String>,
    listeners: HashMap<ListenerId, String>,
}

/// Cache of remote objects with reference-counted subscriptions.
pub struct ObjectStore {
    sender: Arc<dyn RequestSender>,
    state: Mutex<StoreState>,
    scans: AtomicU64,
}

impl ObjectStore {
    /// Create an empty store that sends watch frames through `sender`.
    pub fn new(sender: Arc<dyn RequestSender>) -> Self {
        Self {
            sender,
            state: Mutex::new(StoreState::default()),
            scans: AtomicU64::new(0),
        }
    }

    /// Watch `pattern` on behalf of `listener`.
    ///
    /// `callback` receives the currently cached matches before this returns,
    /// then every change. If `listener` was watching another pattern it is
    /// moved off it first. Returns the acknowledgement handle when a new
    /// `watch` frame went out; `None` when the subscription already existed
    /// or the connection is down (it is replayed on connect).
    pub fn watch(
        &self,
        pattern: &str,
        listener: ListenerId,
        callback: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Result<Option<PendingAck>> {
        let pattern = ObjectPattern::parse(pattern)?;

        let mut released = None;
        let (registry, is_new) = {
            let mut state = self.state.lock();
            let moving = state
                .listeners
                .get(&listener)
                .is_some_and(|previous| previous != pattern.as_str());

            let is_new = !state.subscriptions.contains_key(pattern.as_str());
            if is_new {
                if !pattern.is_exact() {
                    let _ = state.wildcard_patterns.insert(pattern.as_str().to_string());
                }
                let _ = state.subscriptions.insert(
                    pattern.as_str().to_string(),
                    Subscription {
                        pattern: pattern.clone(),
                        ref_count: 0,
                        registry: Arc::new(ListenerRegistry::multi(pattern.as_str())),
                    },
                );
            }

            // Detach only after the new subscription exists so objects it
            // shares with the old pattern survive eviction.
            if moving {
                released = self.detach(&mut state, &listener);
            }

            let already_counted = state.listeners.contains_key(&listener);
            let Some(sub) = state.subscriptions.get_mut(pattern.as_str()) else {
                return Ok(None);
            };
            sub.registry
                .listen(listener.clone(), move |snapshot: &Snapshot| callback(snapshot.as_slice()))?;
            if !already_counted {
                sub.ref_count += 1;
            }
            let registry = Arc::clone(&sub.registry);
            let _ = state
                .listeners
                .insert(listener.clone(), pattern.as_str().to_string());

            (registry, is_new)
        };

        if let Some(object_id) = released {
            let _ = self.send_unwatch(object_id);
        }

        debug!(pattern = %pattern, listener = %listener, "watch");
        let _ = registry.deliver_to(&listener, || self.current_matches(&pattern));

        if is_new {
            Ok(self.send_watch(pattern.as_str().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Stop delivering to `listener`. Safe to call repeatedly.
    ///
    /// Returns the acknowledgement handle when the last listener left and an
    /// `unwatch` frame went out.
    pub fn unwatch(&self, listener: &ListenerId) -> Option<PendingAck> {
        let released = {
            let mut state = self.state.lock();
            self.detach(&mut state, listener)
        };
        released.and_then(|object_id| self.send_unwatch(object_id))
    }

    /// Route a push from the connection.
    pub fn apply(&self, push: &ObjectPush) {
        match push {
            ObjectPush::Set { id, data } => self.set_object(id, data.clone()),
            ObjectPush::Removed { id } => self.remove_object(id),
        }
    }

    /// Overwrite the cached payload for `id` and notify matching
    /// subscriptions. Pushes no subscription matches are logged and dropped.
    pub fn set_object(&self, id: &str, data: Value) {
        let emissions = {
            let mut state = self.state.lock();
            let targets = Self::matching_subscriptions(&state, id);
            if targets.is_empty() {
                warn!(object_id = %id, "setObject for unwatched object");
                return;
            }
            let _ = state.objects.insert(id.to_string(), data);
            Self::registries(&state, &targets)
        };
        self.emit_all(emissions);
    }

    /// Drop the cached payload for `id` and notify matching subscriptions.
    pub fn remove_object(&self, id: &str) {
        let emissions = {
            let mut state = self.state.lock();
            let targets = Self::matching_subscriptions(&state, id);
            if targets.is_empty() {
                warn!(object_id = %id, "removeObject for unwatched object");
                return;
            }
            let _ = state.objects.remove(id);
            Self::registries(&state, &targets)
        };
        self.emit_all(emissions);
    }

    /// Re-send `watch` for every live subscription. Returns how many frames
    /// were queued.
    pub fn resubscribe_all(&self) -> usize {
        let patterns: Vec<String> = self.state.lock().subscriptions.keys().cloned().collect();
        let mut sent = 0;
        for pattern in patterns {
            if self.send_watch(pattern).is_some() {
                sent += 1;
            }
        }
        debug!(sent, "subscriptions replayed");
        sent
    }

    /// Cached payload for a concrete identifier.
    pub fn get(&self, id: &str) -> Option<Value> {
        self.state.lock().objects.get(id).cloned()
    }

    /// Reference count of a pattern's subscription (0 if none).
    pub fn ref_count(&self, pattern: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(pattern)
            .map_or(0, |sub| sub.ref_count)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Number of cached objects.
    pub fn cached_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// How many identifier scans wildcard matching has performed.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Remove `listener` from its subscription. Returns the pattern to
    /// unwatch when the subscription's count reached zero.
    fn detach(&self, state: &mut StoreState, listener: &ListenerId) -> Option<String> {
        let Some(pattern) = state.listeners.remove(listener) else {
            debug!(listener = %listener, "unwatch for unknown listener");
            return None;
        };
        let sub = state.subscriptions.get_mut(&pattern)?;
        let _ = sub.registry.remove(listener);
        sub.ref_count = sub.ref_count.saturating_sub(1);
        if sub.ref_count > 0 {
            return None;
        }

        let sub = state.subscriptions.remove(&pattern)?;
        let _ = state.wildcard_patterns.remove(&pattern);
        self.evict(state, &sub.pattern);
        Some(pattern)
    }

    /// Drop cached objects matched by `released` that no remaining
    /// subscription matches.
    fn evict(&self, state: &mut StoreState, released: &ObjectPattern) {
        let candidates: Vec<String> = if released.is_exact() {
            state
                .objects
                .contains_key(released.as_str())
                .then(|| released.as_str().to_string())
                .into_iter()
                .collect()
        } else {
            self.scan(state, released).map(|(id, _)| id.clone()).collect()
        };
        for id in candidates {
            if Self::matching_subscriptions(state, &id).is_empty() {
                let _ = state.objects.remove(&id);
            }
        }
    }

    /// Subscriptions whose pattern matches the concrete `id`.
    fn matching_subscriptions(state: &StoreState, id: &str) -> Vec<String> {
        let mut targets = Vec::new();
        if state.subscriptions.contains_key(id) {
            targets.push(id.to_string());
        }
        targets.extend(
            state
                .wildcard_patterns
                .iter()
                .filter(|pattern| path::matches(pattern, id))
                .cloned(),
        );
        targets
    }

    fn collect_matches(&self, state: &StoreState, pattern: &ObjectPattern) -> Snapshot {
        if pattern.is_exact() {
            state.objects.get(pattern.as_str()).cloned().into_iter().collect()
        } else {
            self.scan(state, pattern).map(|(_, v)| v.clone()).collect()
        }
    }

    /// Cached entries matching a wildcard pattern, in identifier order.
    fn scan<'a>(
        &self,
        state: &'a StoreState,
        pattern: &'a ObjectPattern,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        let _ = self.scans.fetch_add(1, Ordering::Relaxed);
        let prefix = literal_prefix(pattern.as_str());
        state
            .objects
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(id, _)| id.starts_with(prefix))
            .filter(move |(id, _)| pattern.matches(id))
    }

    fn current_matches(&self, pattern: &ObjectPattern) -> Snapshot {
        self.collect_matches(&self.state.lock(), pattern)
    }

    fn registries(
        state: &StoreState,
        targets: &[String],
    ) -> Vec<(Arc<ListenerRegistry<Snapshot>>, ObjectPattern)> {
        targets
            .iter()
            .filter_map(|pattern| state.subscriptions.get(pattern))
            .map(|sub| (Arc::clone(&sub.registry), sub.pattern.clone()))
            .collect()
    }

    fn emit_all(&self, emissions: Vec<(Arc<ListenerRegistry<Snapshot>>, ObjectPattern)>) {
        for (registry, pattern) in emissions {
            let _ = registry.emit_with(|| self.current_matches(&pattern));
        }
    }

    fn send_watch(&self, object_id: String) -> Option<PendingAck> {
        self.send(ClientMessage::watch(object_id))
    }

    fn send_unwatch(&self, object_id: String) -> Option<PendingAck> {
        self.send(ClientMessage::unwatch(object_id))
    }

    fn send(&self, message: ClientMessage) -> Option<PendingAck> {
        let kind = message.kind();
        match self.sender.request(message) {
            Ok(ack) => Some(ack),
            Err(err) if err.is_connectivity() => {
                debug!(kind, "not connected, frame deferred to reconnect");
                None
            }
            Err(err) => {
                warn!(kind, error = %err, "failed to send subscription frame");
                None
            }
        }
    }
}

/// Leading literal segments of a pattern, including the trailing separator.
/// `users/*/posts` → `users/`; `*/x` → ``.
fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(path::WILDCARD) {
        Some(idx) => {
            let head = &pattern[..idx];
            match head.rfind(path::SEPARATOR) {
                Some(sep) => &pattern[..=sep],
                None => "",
            }
        }
        None => pattern,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
