//! `ActionDispatcher`: composes scope chains and sends them to the server.
//!
//! A UI action is dispatched inside a [`ScopeStack`]: the chain of
//! enclosing scopes, innermost first, each with an optional payload. The
//! dispatcher prepends the triggered action, sends the chain with the
//! session id through a [`DispatchTransport`] and routes the reply.
//!
//! While a dispatch is in flight the counter for its [`FullId`] is raised
//! and status listeners see [`ActionStatus::is_loading`]. The counter is
//! lowered by a drop guard, so failed and cancelled dispatches release it
//! too.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};
use weft_core::errors::Result;
use weft_core::listeners::ListenerRegistry;
use weft_core::protocol::{
    ActionKey, DispatchEnvelope, DispatchReply, Notice, ReplyAction, ScopeFrame, UpdateAction,
};
use weft_core::{ListenerId, SyncError};

use crate::presenter::Presenter;
use crate::session::SessionManager;
use crate::transport::DispatchTransport;
use crate::updates::UpdateManager;

/// Notice shown when a dispatch cannot reach the server.
pub const OFFLINE_NOTICE: &str = "You appear to be offline. Please try again later.";

// ─────────────────────────────────────────────────────────────────────────────
// Scopes
// ─────────────────────────────────────────────────────────────────────────────

/// Chain of enclosing action scopes, innermost first.
///
/// Immutable: [`nest`](Self::nest) returns a new stack. A blocked scope
/// stays blocked in every stack nested inside it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
    blocked: bool,
}

impl ScopeStack {
    /// Empty, unblocked stack.
    pub fn root() -> Self {
        Self::default()
    }

    /// Stack with `key` as the new innermost scope.
    #[must_use]
    pub fn nest(&self, key: ActionKey, payload: Option<Value>) -> Self {
        let mut frames = Vec::with_capacity(self.frames.len() + 1);
        frames.push(ScopeFrame::new(key, payload));
        frames.extend(self.frames.iter().cloned());
        Self {
            frames,
            blocked: self.blocked,
        }
    }

    /// This stack, blocked.
    #[must_use]
    pub fn blocked(&self) -> Self {
        self.with_blocked(true)
    }

    /// This stack, blocked if `blocked` is set. Never unblocks an inherited
    /// block.
    #[must_use]
    pub fn with_blocked(&self, blocked: bool) -> Self {
        Self {
            frames: self.frames.clone(),
            blocked: self.blocked || blocked,
        }
    }

    /// Whether dispatches under this stack are refused.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Scope frames, innermost first.
    pub fn frames(&self) -> &[ScopeFrame] {
        &self.frames
    }
}

/// Local identity of an action within its scope chain.
///
/// Key segments joined with `.`, frames joined with `/`, innermost first.
/// Never sent to the server.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullId(String);

impl FullId {
    /// Full id of `action` dispatched inside `scope`.
    pub fn of(scope: &ScopeStack, action: Option<&ActionKey>) -> Self {
        let parts: Vec<String> = action
            .into_iter()
            .chain(scope.frames.iter().map(|f| &f.key))
            .map(ActionKey::joined)
            .collect();
        Self(parts.join("/"))
    }

    /// The id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for FullId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for FullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// In-flight state of one full id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionStatus {
    /// Dispatches currently awaiting a reply.
    pub in_flight: usize,
}

impl ActionStatus {
    /// Whether at least one dispatch is awaiting a reply.
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}

/// How a dispatch ended when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply was received and routed.
    Completed,
    /// The server was unreachable; an offline notice was shown.
    Offline,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Sends actions and routes replies.
pub struct ActionDispatcher {
    session: Arc<SessionManager>,
    transport: Arc<dyn DispatchTransport>,
    presenter: Arc<dyn Presenter>,
    updates: Arc<UpdateManager>,
    in_flight: Mutex<HashMap<FullId, usize>>,
    status: DashMap<FullId, Arc<ListenerRegistry<ActionStatus>>>,
    actions: DashMap<ActionKey, Arc<ListenerRegistry<Value>>>,
}

impl ActionDispatcher {
    /// Dispatcher sending through `transport`.
    pub fn new(
        session: Arc<SessionManager>,
        transport: Arc<dyn DispatchTransport>,
        presenter: Arc<dyn Presenter>,
        updates: Arc<UpdateManager>,
    ) -> Self {
        Self {
            session,
            transport,
            presenter,
            updates,
            in_flight: Mutex::new(HashMap::new()),
            status: DashMap::new(),
            actions: DashMap::new(),
        }
    }

    // ─── Status listeners ────────────────────────────────────────────────

    /// Follow the status of `full_id`. `callback` receives the current
    /// status immediately.
    pub fn watch_status(
        &self,
        full_id: &FullId,
        listener: ListenerId,
        callback: impl Fn(&ActionStatus) + Send + Sync + 'static,
    ) -> Result<()> {
        let registry = Arc::clone(
            self.status
                .entry(full_id.clone())
                .or_insert_with(|| Arc::new(ListenerRegistry::multi(full_id.as_str())))
                .value(),
        );
        registry.listen(listener.clone(), callback)?;
        let _ = registry.deliver_to(&listener, || self.status(full_id));
        Ok(())
    }

    /// Stop following a status. Returns whether `listener` was registered.
    pub fn unwatch_status(&self, full_id: &FullId, listener: &ListenerId) -> bool {
        let removed = self
            .status
            .get(full_id)
            .is_some_and(|registry| registry.remove(listener));
        let _ = self
            .status
            .remove_if(full_id, |_, registry| registry.is_empty());
        removed
    }

    /// Current status of `full_id`.
    pub fn status(&self, full_id: &FullId) -> ActionStatus {
        ActionStatus {
            in_flight: self.in_flight.lock().get(full_id).copied().unwrap_or(0),
        }
    }

    /// Adjust the counter, then publish the status read at delivery time.
    fn bump(&self, full_id: &FullId, raise: bool) {
        {
            let mut counts = self.in_flight.lock();
            let count = counts.entry(full_id.clone()).or_insert(0);
            *count = if raise {
                *count + 1
            } else {
                count.saturating_sub(1)
            };
            if *count == 0 {
                let _ = counts.remove(full_id);
            }
        }
        let registry = self.status.get(full_id).map(|r| Arc::clone(r.value()));
        if let Some(registry) = registry {
            let _ = registry.emit_with(|| self.status(full_id));
        }
    }

    // ─── Reply action listeners ──────────────────────────────────────────

    /// Receive reply actions addressed to `key`.
    pub fn on_action(
        &self,
        key: ActionKey,
        listener: ListenerId,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Result<()> {
        let registry = Arc::clone(
            self.actions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(ListenerRegistry::multi(key.joined())))
                .value(),
        );
        registry.listen(listener, callback)
    }

    /// Stop receiving reply actions for `key`.
    pub fn remove_action_listener(&self, key: &ActionKey, listener: &ListenerId) -> bool {
        let removed = self
            .actions
            .get(key)
            .is_some_and(|registry| registry.remove(listener));
        let _ = self.actions.remove_if(key, |_, registry| registry.is_empty());
        removed
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    /// Whether `action` inside `scope` would be refused.
    pub fn is_disabled(&self, scope: &ScopeStack, action: Option<&ActionKey>) -> bool {
        action.is_none() || scope.is_blocked()
    }

    /// Send `action` with `payload` inside `scope` and route the reply.
    ///
    /// Refused with [`SyncError::ActionDisabled`] when the action is unbound
    /// or the scope is blocked. An unreachable server yields
    /// [`DispatchOutcome::Offline`] after an offline notice.
    pub async fn dispatch(
        &self,
        scope: &ScopeStack,
        action: Option<&ActionKey>,
        payload: Option<Value>,
    ) -> Result<DispatchOutcome> {
        let full_id = FullId::of(scope, action);
        let Some(action) = action.filter(|_| !scope.is_blocked()) else {
            debug!(full_id = %full_id, "dispatch refused, action disabled");
            return Err(SyncError::ActionDisabled {
                full_id: full_id.into_string(),
            });
        };

        let envelope = DispatchEnvelope {
            session_id: self.session.get_or_create_id(),
            events: scope.nest(action.clone(), payload).frames,
        };

        let _guard = InFlightGuard::enter(self, full_id.clone());
        debug!(full_id = %full_id, frames = envelope.events.len(), "dispatching");

        match self.transport.send(envelope).await {
            Ok(reply) => {
                self.route_reply(reply)?;
                Ok(DispatchOutcome::Completed)
            }
            Err(err) if err.is_connectivity() => {
                warn!(full_id = %full_id, error = %err, "dispatch failed, server unreachable");
                self.presenter.notice(Notice::warning(OFFLINE_NOTICE));
                Ok(DispatchOutcome::Offline)
            }
            Err(err) => {
                warn!(full_id = %full_id, error = %err, kind = err.error_kind(), "dispatch failed");
                Err(err)
            }
        }
    }

    fn route_reply(&self, reply: DispatchReply) -> Result<()> {
        match reply {
            DispatchReply::Actions(actions) => self.route_actions(actions),
            DispatchReply::Updates(updates) => {
                for update in updates {
                    self.route_update(update);
                }
                Ok(())
            }
        }
    }

    fn route_actions(&self, actions: Vec<ReplyAction>) -> Result<()> {
        let mut targets = Vec::with_capacity(actions.len());
        for action in &actions {
            let registry = self
                .actions
                .get(&action.key)
                .map(|r| Arc::clone(r.value()))
                .filter(|r| !r.is_empty());
            let Some(registry) = registry else {
                error!(key = %action.key, "reply references unregistered action");
                return Err(SyncError::UnknownAction {
                    key: action.key.joined(),
                });
            };
            targets.push(registry);
        }
        for (registry, action) in targets.into_iter().zip(actions) {
            debug!(key = %action.key, "routing reply action");
            let _ = registry.emit(action.data);
        }
        Ok(())
    }

    fn route_update(&self, update: UpdateAction) {
        match update {
            UpdateAction::AddNotice { level, message } => {
                self.presenter.notice(Notice { level, message });
            }
            UpdateAction::FullUpdate { root } => {
                debug!("full update");
                self.presenter.full_update(root);
            }
            UpdateAction::ComponentUpdate { identifier, patch } => {
                self.updates.apply(identifier, patch);
            }
        }
    }
}

struct InFlightGuard<'a> {
    dispatcher: &'a ActionDispatcher,
    full_id: FullId,
}

impl<'a> InFlightGuard<'a> {
    fn enter(dispatcher: &'a ActionDispatcher, full_id: FullId) -> Self {
        dispatcher.bump(&full_id, true);
        Self {
            dispatcher,
            full_id,
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.bump(&self.full_id, false);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingPresenter, StaticTransport};
    use assert_matches::assert_matches;
    use serde_json::json;
    use tokio::sync::Notify;
    use weft_core::logging::capture_logs;
    use weft_core::protocol::NoticeLevel;

    fn key(name: &str) -> ActionKey {
        ActionKey::new([name])
    }

    fn dispatcher(
        transport: Arc<StaticTransport>,
    ) -> (Arc<ActionDispatcher>, Arc<RecordingPresenter>, Arc<UpdateManager>) {
        let presenter = Arc::new(RecordingPresenter::default());
        let updates = Arc::new(UpdateManager::new());
        let dispatcher = ActionDispatcher::new(
            Arc::new(SessionManager::with_id("s-1".into())),
            transport,
            presenter.clone(),
            Arc::clone(&updates),
        );
        (Arc::new(dispatcher), presenter, updates)
    }

    #[test]
    fn nested_scopes_compose_innermost_first() {
        let outer = ScopeStack::root().nest(key("Bar"), Some(json!({"x": 1})));
        let inner = outer.nest(ActionKey::new(["Foo", "item"]), None);
        assert_eq!(inner.frames().len(), 2);
        assert_eq!(inner.frames()[0].key, ActionKey::new(["Foo", "item"]));
        assert_eq!(inner.frames()[1].payload, Some(json!({"x": 1})));
        assert_eq!(FullId::of(&inner, Some(&key("Go"))).as_str(), "Go/Foo.item/Bar");
    }

    #[test]
    fn block_propagates_to_nested_scopes() {
        let outer = ScopeStack::root().nest(key("Form"), None).blocked();
        let inner = outer.nest(key("Row"), None).with_blocked(false);
        assert!(inner.is_blocked());
        assert!(!ScopeStack::root().with_blocked(false).is_blocked());
    }

    #[tokio::test]
    async fn dispatch_sends_action_then_scopes() {
        let transport = StaticTransport::replying(Ok(DispatchReply::default()));
        let (dispatcher, _, _) = dispatcher(transport.clone());
        let scope = ScopeStack::root().nest(key("Bar"), Some(json!({"x": 1})));

        let outcome = dispatcher
            .dispatch(&scope, Some(&key("Foo")), Some(json!("user")))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);

        let envelopes = transport.envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].session_id.as_str(), "s-1");
        assert_eq!(
            serde_json::to_value(&envelopes[0].events).unwrap(),
            json!([
                {"key": ["Foo"], "payload": "user"},
                {"key": ["Bar"], "payload": {"x": 1}}
            ])
        );
    }

    #[tokio::test]
    async fn disabled_dispatch_never_reaches_transport() {
        let transport = StaticTransport::replying(Ok(DispatchReply::default()));
        let (dispatcher, _, _) = dispatcher(transport.clone());
        let blocked = ScopeStack::root().nest(key("Form"), None).blocked();

        assert!(dispatcher.is_disabled(&blocked, Some(&key("Save"))));
        assert!(dispatcher.is_disabled(&ScopeStack::root(), None));
        assert_matches!(
            dispatcher.dispatch(&blocked, Some(&key("Save")), None).await,
            Err(SyncError::ActionDisabled { full_id }) if full_id == "Save/Form"
        );
        assert_matches!(
            dispatcher.dispatch(&ScopeStack::root(), None, None).await,
            Err(SyncError::ActionDisabled { .. })
        );
        assert!(transport.envelopes().is_empty());
    }

    #[tokio::test]
    async fn status_listeners_see_loading() {
        let gate = Arc::new(Notify::new());
        let transport = StaticTransport::gated(Ok(DispatchReply::default()), Arc::clone(&gate));
        let (dispatcher, _, _) = dispatcher(transport);
        let full_id = FullId::from("Save");

        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        for (name, seen) in [("a", &first), ("b", &second)] {
            let s = Arc::clone(seen);
            dispatcher
                .watch_status(&full_id, name.into(), move |st: &ActionStatus| {
                    s.lock().push(st.is_loading());
                })
                .unwrap();
        }

        let d = Arc::clone(&dispatcher);
        let task = tokio::spawn(async move {
            d.dispatch(&ScopeStack::root(), Some(&key("Save")), None).await
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(dispatcher.status(&full_id).is_loading());

        gate.notify_one();
        assert_eq!(task.await.unwrap().unwrap(), DispatchOutcome::Completed);
        assert_eq!(dispatcher.status(&full_id), ActionStatus::default());
        assert_eq!(*first.lock(), vec![false, true, false]);
        assert_eq!(*second.lock(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn overlapping_dispatches_share_one_counter() {
        let gate = Arc::new(Notify::new());
        let transport = StaticTransport::gated(Ok(DispatchReply::default()), Arc::clone(&gate));
        let (dispatcher, _, _) = dispatcher(transport);
        let full_id = FullId::from("Save");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        dispatcher
            .watch_status(&full_id, "spinner".into(), move |st: &ActionStatus| {
                s.lock().push(st.in_flight);
            })
            .unwrap();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    d.dispatch(&ScopeStack::root(), Some(&key("Save")), None).await
                })
            })
            .collect();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.status(&full_id).in_flight, 2);

        gate.notify_one();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.status(&full_id).in_flight, 1);
        assert!(dispatcher.status(&full_id).is_loading());

        gate.notify_one();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), DispatchOutcome::Completed);
        }
        assert!(!dispatcher.status(&full_id).is_loading());
        assert_eq!(*seen.lock(), vec![0, 1, 2, 1, 0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_dispatches_end_on_idle_status() {
        let transport = StaticTransport::replying(Ok(DispatchReply::default()));
        let (dispatcher, _, _) = dispatcher(transport);
        let full_id = FullId::from("Save");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        dispatcher
            .watch_status(&full_id, "spinner".into(), move |st: &ActionStatus| {
                s.lock().push(st.in_flight);
            })
            .unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let d = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    d.dispatch(&ScopeStack::root(), Some(&key("Save")), None).await
                })
            })
            .collect();
        for task in tasks {
            let _ = task.await.unwrap().unwrap();
        }

        assert_eq!(seen.lock().last(), Some(&0));
        assert_eq!(dispatcher.status(&full_id), ActionStatus::default());
    }

    #[tokio::test]
    async fn failed_dispatch_releases_counter() {
        let transport = StaticTransport::replying(Err(SyncError::Application {
            message: "nope".into(),
            retry_after: None,
        }));
        let (dispatcher, _, _) = dispatcher(transport);
        let err = dispatcher
            .dispatch(&ScopeStack::root(), Some(&key("Save")), None)
            .await
            .unwrap_err();
        assert_matches!(err, SyncError::Application { .. });
        assert_eq!(dispatcher.status(&FullId::from("Save")).in_flight, 0);
    }

    #[tokio::test]
    async fn cancelled_dispatch_releases_counter() {
        let gate = Arc::new(Notify::new());
        let transport = StaticTransport::gated(Ok(DispatchReply::default()), gate);
        let (dispatcher, _, _) = dispatcher(transport);
        let d = Arc::clone(&dispatcher);
        let task = tokio::spawn(async move {
            d.dispatch(&ScopeStack::root(), Some(&key("Save")), None).await
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.status(&FullId::from("Save")).in_flight, 1);
        task.abort();
        let _ = task.await;
        assert_eq!(dispatcher.status(&FullId::from("Save")).in_flight, 0);
    }

    #[tokio::test]
    async fn connectivity_failure_is_offline_outcome() {
        let transport = StaticTransport::replying(Err(SyncError::Connectivity("refused".into())));
        let (dispatcher, presenter, _) = dispatcher(transport);
        let outcome = dispatcher
            .dispatch(&ScopeStack::root(), Some(&key("Save")), None)
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Offline);
        let notices = presenter.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(notices[0].message, OFFLINE_NOTICE);
    }

    #[tokio::test]
    async fn reply_actions_reach_registered_keys() {
        let transport = StaticTransport::replying(Ok(DispatchReply::Actions(vec![ReplyAction {
            key: ActionKey::new(["toast", "show"]),
            data: json!("saved"),
        }])));
        let (dispatcher, _, _) = dispatcher(transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        dispatcher
            .on_action(ActionKey::new(["toast", "show"]), "toaster".into(), move |v: &Value| {
                s.lock().push(v.clone());
            })
            .unwrap();

        let _ = dispatcher
            .dispatch(&ScopeStack::root(), Some(&key("Save")), None)
            .await
            .unwrap();
        assert_eq!(*seen.lock(), vec![json!("saved")]);
    }

    #[tokio::test]
    async fn unknown_reply_key_is_hard_error() {
        let (logs, _guard) = capture_logs();
        let transport = StaticTransport::replying(Ok(DispatchReply::Actions(vec![ReplyAction {
            key: ActionKey::new(["ghost"]),
            data: Value::Null,
        }])));
        let (dispatcher, _, _) = dispatcher(transport);
        let err = dispatcher
            .dispatch(&ScopeStack::root(), Some(&key("Save")), None)
            .await
            .unwrap_err();
        assert_eq!(err, SyncError::UnknownAction { key: "ghost".into() });
        assert!(err.is_protocol_violation());
        assert!(logs.has_event(tracing::Level::ERROR, "unregistered action"));
    }

    #[tokio::test]
    async fn removed_action_listener_makes_key_unknown() {
        let transport = StaticTransport::replying(Ok(DispatchReply::Actions(vec![ReplyAction {
            key: key("toast"),
            data: Value::Null,
        }])));
        let (dispatcher, _, _) = dispatcher(transport);
        dispatcher.on_action(key("toast"), "t".into(), |_| {}).unwrap();
        assert!(dispatcher.remove_action_listener(&key("toast"), &"t".into()));
        assert!(!dispatcher.remove_action_listener(&key("toast"), &"t".into()));
        assert_matches!(
            dispatcher.dispatch(&ScopeStack::root(), Some(&key("Save")), None).await,
            Err(SyncError::UnknownAction { .. })
        );
    }

    #[tokio::test]
    async fn update_actions_route_by_strategy() {
        let transport = StaticTransport::replying(Ok(DispatchReply::Updates(vec![
            UpdateAction::AddNotice {
                level: NoticeLevel::Info,
                message: "saved".into(),
            },
            UpdateAction::FullUpdate { root: json!({"type": "page"}) },
            UpdateAction::ComponentUpdate {
                identifier: 4,
                patch: json!({"text": "done"}),
            },
        ])));
        let (dispatcher, presenter, updates) = dispatcher(transport);
        let patches = Arc::new(Mutex::new(Vec::new()));
        let p = Arc::clone(&patches);
        updates.register(4, move |v: &Value| p.lock().push(v.clone())).unwrap();

        let _ = dispatcher
            .dispatch(&ScopeStack::root(), Some(&key("Save")), None)
            .await
            .unwrap();
        assert_eq!(presenter.notices(), vec![Notice::info("saved")]);
        assert_eq!(presenter.roots(), vec![json!({"type": "page"})]);
        assert_eq!(*patches.lock(), vec![json!({"text": "done"})]);
    }
}
