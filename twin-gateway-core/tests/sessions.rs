mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use twin_gateway_core::{ListenerCallbacks, TwinGateway};
use twin_gateway_models::settings::{Inner, SessionConfig};
use twin_gateway_models::{Settings, TwinEvent, UpdateRequest};

fn short_ttl_settings(ttl_ms: u64) -> Settings {
    Settings::from(Inner {
        session: SessionConfig {
            default_ttl_ms: ttl_ms,
        },
        ..Default::default()
    })
}

#[tokio::test]
async fn expired_default_session_is_replaced_on_next_access() {
    common::init();
    let gw = TwinGateway::start(short_ttl_settings(50));

    let first = gw.default_session("tok");
    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = gw.default_session("tok");

    assert_ne!(first.id(), second.id());
    assert!(first.is_expired());
    assert!(!second.is_expired());
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn extend_keeps_the_default_session_alive() {
    common::init();
    let gw = TwinGateway::start(short_ttl_settings(100));

    let session = gw.default_session("tok");
    session.extend(chrono::Duration::seconds(60)).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let same = gw.default_session("tok");
    assert_eq!(session.id(), same.id());
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn expired_session_no_longer_receives_events() {
    common::init();
    let gw = TwinGateway::start(short_ttl_settings(100));

    let session = gw.default_session("tok");
    let events: Arc<Mutex<Vec<TwinEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    gw.add_listener(
        &session,
        &["DATA/*"],
        ListenerCallbacks::data(move |e| sink.lock().unwrap().push(e.clone())),
    )
    .unwrap();

    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 1i64))
        .await
        .unwrap();
    common::flush(&gw).await;
    assert_eq!(events.lock().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    gw.push_update(UpdateRequest::new("p1", "svc", "temp", 2i64))
        .await
        .unwrap();
    common::flush(&gw).await;
    assert_eq!(events.lock().unwrap().len(), 1);
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn listeners_on_an_expired_session_are_rejected() {
    common::init();
    let gw = TwinGateway::start(short_ttl_settings(50));

    let session = gw.default_session("tok");
    tokio::time::sleep(Duration::from_millis(80)).await;

    let result = gw.add_listener(&session, &["DATA/*"], ListenerCallbacks::data(|_| {}));
    assert!(result.is_err());
    gw.stop().await.unwrap();
}

#[tokio::test]
async fn standalone_sessions_are_distinct_from_the_default() {
    common::init();
    let gw = TwinGateway::start(Settings::default());

    let default = gw.default_session("tok");
    let standalone = gw.create_session("tok");
    assert_ne!(default.id(), standalone.id());

    // The default slot is unaffected by standalone creation.
    assert_eq!(gw.default_session("tok").id(), default.id());
    assert_eq!(gw.session(standalone.id()).unwrap().id(), standalone.id());
    gw.stop().await.unwrap();
}
