//! End-to-end runtime behavior over an in-memory connection.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use weft_client::dispatch::OFFLINE_NOTICE;
use weft_client::runtime::PARSE_FAILURE_NOTICE;
use weft_client::testing::{MockConnector, MockServer, RecordingPresenter, Step};
use weft_client::{ConnectionState, DispatchOutcome, ScopeStack, SyncRuntime};
use weft_core::protocol::{ActionKey, Notice, NoticeLevel};
use weft_settings::ClientSettings;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn runtime(steps: Vec<Step>) -> (SyncRuntime, Arc<MockConnector>, Arc<RecordingPresenter>) {
    let connector = MockConnector::new(steps);
    let presenter = Arc::new(RecordingPresenter::default());
    let runtime = SyncRuntime::builder(ClientSettings::default())
        .connector(connector.clone())
        .presenter(presenter.clone())
        .build()
        .unwrap();
    (runtime, connector, presenter)
}

fn recorder() -> (Arc<Mutex<Vec<Vec<Value>>>>, impl Fn(&[Value]) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    (seen, move |values: &[Value]| s.lock().push(values.to_vec()))
}

fn watched(server: &MockServer, kind: &str) -> Vec<String> {
    server
        .sent_of_type(kind)
        .iter()
        .filter_map(|frame| frame["objectId"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn wildcard_watch_sees_set_then_remove() {
    let (runtime, connector, _) = runtime(vec![Step::Accept]);
    let (seen, callback) = recorder();
    let _ = runtime.store().watch("users/*", "user-list".into(), callback).unwrap();

    runtime.start();
    settle().await;
    let server = connector.server(0);
    assert_eq!(watched(&server, "watch"), vec!["users/*"]);

    server.push(json!({"type": "setObject", "id": "users/1", "data": {"name": "Ann"}}));
    settle().await;
    assert_eq!(seen.lock().last().unwrap(), &vec![json!({"name": "Ann"})]);

    server.push(json!({"type": "removeObject", "id": "users/1"}));
    settle().await;
    assert_eq!(seen.lock().last().unwrap(), &Vec::<Value>::new());
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn watches_are_replayed_after_reconnect() {
    let (runtime, connector, _) = runtime(vec![Step::Accept, Step::Accept]);
    runtime.start();
    settle().await;

    let (_, callback) = recorder();
    let _ = runtime.store().watch("users/*", "user-list".into(), callback).unwrap();
    settle().await;
    assert_eq!(watched(&connector.server(0), "watch"), vec!["users/*"]);

    connector.server(0).close();
    settle().await;
    assert_eq!(runtime.connection().state(), ConnectionState::Connecting);

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(runtime.connection().state(), ConnectionState::Connected);
    assert_eq!(watched(&connector.server(1), "watch"), vec!["users/*"]);
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn replay_larger_than_send_queue_reaches_server() {
    let connector = MockConnector::new(vec![Step::Accept]);
    let mut settings = ClientSettings::default();
    settings.connection.send_queue_capacity = 4;
    let runtime = SyncRuntime::builder(settings)
        .connector(connector.clone())
        .build()
        .unwrap();

    for i in 0..10 {
        let _ = runtime
            .store()
            .watch(&format!("users/{i}"), format!("row-{i}").into(), |_| {})
            .unwrap();
    }
    runtime.start();
    settle().await;

    let mut sent = watched(&connector.server(0), "watch");
    sent.sort();
    let mut expected: Vec<String> = (0..10).map(|i| format!("users/{i}")).collect();
    expected.sort();
    assert_eq!(sent, expected);
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn shared_subscription_unwatches_once() {
    let (runtime, connector, _) = runtime(vec![Step::Accept]);
    runtime.start();
    settle().await;
    let server = connector.server(0);

    let (_, first) = recorder();
    let (_, second) = recorder();
    let _ = runtime.store().watch("users/1", "a".into(), first).unwrap();
    let _ = runtime.store().watch("users/1", "b".into(), second).unwrap();
    settle().await;
    assert_eq!(watched(&server, "watch"), vec!["users/1"]);

    assert!(runtime.store().unwatch(&"a".into()).is_none());
    settle().await;
    assert!(watched(&server, "unwatch").is_empty());
    assert_eq!(runtime.store().ref_count("users/1"), 1);

    let _ = runtime.store().unwatch(&"b".into());
    let _ = runtime.store().unwatch(&"b".into());
    let _ = runtime.store().unwatch(&"nobody".into());
    settle().await;
    assert_eq!(watched(&server, "unwatch"), vec!["users/1"]);
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn socket_dispatch_sends_scope_chain() {
    let (runtime, connector, _) = runtime(vec![Step::Accept]);
    runtime.start();
    settle().await;
    let server = connector.server(0);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    runtime
        .dispatcher()
        .on_action(ActionKey::new(["toast"]), "toaster".into(), move |v: &Value| {
            s.lock().push(v.clone());
        })
        .unwrap();

    let handle = runtime.clone();
    let task = tokio::spawn(async move {
        let scope = ScopeStack::root().nest(ActionKey::new(["Bar"]), Some(json!({"x": 1})));
        handle
            .emit_event(&scope, Some(&ActionKey::new(["Foo"])), Some(json!("user")))
            .await
    });
    settle().await;

    let frames = server.sent_of_type("emitEvent");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["objectId"], "events");
    assert_eq!(frames[0]["key"], json!(["Foo"]));
    assert_eq!(
        frames[0]["data"]["events"],
        json!([
            {"key": ["Foo"], "payload": "user"},
            {"key": ["Bar"], "payload": {"x": 1}}
        ])
    );
    assert_eq!(
        frames[0]["data"]["sessionId"],
        runtime.session().current().unwrap().as_str()
    );

    server.push(json!({
        "type": "acknowledge",
        "requestId": frames[0]["requestId"],
        "actions": [{"key": ["toast"], "data": "saved"}]
    }));
    assert_eq!(task.await.unwrap().unwrap(), DispatchOutcome::Completed);
    assert_eq!(*seen.lock(), vec![json!("saved")]);
    runtime.stop().await;
}

#[tokio::test]
async fn dispatch_while_offline_shows_notice() {
    let (runtime, _, presenter) = runtime(vec![]);
    let outcome = runtime
        .emit_event(&ScopeStack::root(), Some(&ActionKey::new(["Save"])), None)
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Offline);
    assert_eq!(
        presenter.notices(),
        vec![Notice {
            level: NoticeLevel::Warning,
            message: OFFLINE_NOTICE.into(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn unparseable_frame_shows_generic_notice() {
    let (runtime, connector, presenter) = runtime(vec![Step::Accept]);
    runtime.start();
    settle().await;

    connector.server(0).push_raw("<html>");
    settle().await;
    assert_eq!(presenter.notices(), vec![Notice::error(PARSE_FAILURE_NOTICE)]);
    assert_eq!(runtime.connection().state(), ConnectionState::Connected);
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn connectivity_reaches_presenter() {
    let (runtime, _, presenter) = runtime(vec![Step::Refuse, Step::Accept]);
    runtime.start();
    settle().await;
    assert_eq!(presenter.connectivity(), vec![false]);
    assert_eq!(
        runtime.connection().state(),
        ConnectionState::RecoveringOffline
    );

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert_eq!(presenter.connectivity(), vec![false, true]);
    runtime.stop().await;
}

#[tokio::test(start_paused = true)]
async fn fatal_endpoint_shows_notice() {
    let (runtime, _, presenter) = runtime(vec![Step::Fatal]);
    runtime.start();
    settle().await;
    let notices = presenter.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.starts_with("Connection stopped"));
    assert_eq!(runtime.connection().state(), ConnectionState::Disconnected);
}
