//! Connection lifecycle tests against a scripted transport, in virtual time

mod common;

use common::*;
use event_schema::EventType;
use parking_lot::Mutex;
use realtime_client::{ConnectionState, Topic};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_five_retries_with_doubling_delays() {
    init_tracing();
    let transport = FakeTransport::refusing();
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(None).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    wait_for_state(&manager, ConnectionState::GaveUp).await;

    assert_eq!(transport.open_count(), 6);
    let expected = [1, 2, 4, 8, 16].map(Duration::from_secs);
    for (gap, want) in transport.open_gaps().into_iter().zip(expected) {
        assert_close_to(gap, want);
    }

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.open_count(), 6);
    assert_eq!(manager.state(), ConnectionState::GaveUp);
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_give_up_resets_budget() {
    let transport = FakeTransport::refusing();
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(None).await;
    wait_for_state(&manager, ConnectionState::GaveUp).await;

    manager.connect(None).await;
    assert_eq!(transport.open_count(), 7);
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert_eq!(manager.reconnect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_falls_into_reconnect() {
    let transport = FakeTransport::hanging();
    let (manager, _dispatcher) = manager(&transport);

    let started = Instant::now();
    manager.connect(None).await;

    assert_close_to(started.elapsed(), Duration::from_secs(10));
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert_eq!(manager.reconnect_attempts(), 1);
    assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_open_one_socket() {
    let transport = FakeTransport::scripted(
        vec![Script::AcceptAfter(Duration::from_secs(2))],
        Script::Accept,
    );
    let (manager, _dispatcher) = manager(&transport);

    tokio::join!(manager.connect(None), manager.connect(None));
    assert!(manager.is_connected());

    manager.connect(None).await;
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_credential_given_while_reconnecting_is_used_by_retry() {
    let transport = FakeTransport::scripted(vec![Script::Refuse], Script::Accept);
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(None).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    manager.connect(Some("fresh".into())).await;
    assert_eq!(transport.open_count(), 1);

    wait_for_state(&manager, ConnectionState::Connected).await;
    assert_eq!(
        transport.urls(),
        vec![TEST_URL.to_string(), format!("{}?token=fresh", TEST_URL)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_credential_given_while_connected_is_used_after_server_close() {
    let transport = FakeTransport::accepting();
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(None).await;
    assert!(manager.is_connected());

    manager.connect(Some("later".into())).await;
    assert_eq!(transport.open_count(), 1);

    transport.close_server();
    settle().await;
    wait_for_state(&manager, ConnectionState::Connected).await;

    assert_eq!(transport.open_count(), 2);
    assert_eq!(
        transport.urls().last().map(String::as_str),
        Some(format!("{}?token=later", TEST_URL).as_str())
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_while_reconnect_pending_does_not_open() {
    let transport = FakeTransport::refusing();
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(None).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    manager.connect(None).await;
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_connection() {
    let transport = FakeTransport::accepting();
    let (manager, _dispatcher) = manager(&transport);

    assert!(!manager.send("order.subscribe", json!({"orderId": "1"})));

    manager.connect(None).await;
    assert!(manager.send("order.subscribe", json!({"orderId": "1"})));

    let sent: Vec<Value> = transport
        .take_sent()
        .iter()
        .map(|text| serde_json::from_str(text).unwrap())
        .collect();
    assert_eq!(sent, vec![json!({"event": "order.subscribe", "data": {"orderId": "1"}})]);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_pings_every_interval() {
    let transport = FakeTransport::accepting();
    let (manager, _dispatcher) = manager(&transport);
    manager.connect(None).await;

    sleep(Duration::from_secs(29)).await;
    assert!(transport.take_sent().is_empty());

    sleep(Duration::from_secs(2)).await;
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    let ping: Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(ping["event"], "ping");
    assert!(ping["data"]["timestamp"].is_i64());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.take_sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_reconnects_and_heartbeat() {
    let transport = FakeTransport::accepting();
    let (manager, _dispatcher) = manager(&transport);
    manager.connect(None).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(!manager.send("ping", json!({})));

    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 1);
    assert!(transport.take_sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let transport = FakeTransport::refusing();
    let (manager, _dispatcher) = manager(&transport);
    manager.connect(None).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    manager.disconnect();
    sleep(Duration::from_secs(120)).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_server_close_reconnects_with_stored_credential() {
    init_tracing();
    let transport = FakeTransport::scripted(
        vec![Script::Accept, Script::Refuse, Script::Accept],
        Script::Accept,
    );
    let (manager, _dispatcher) = manager(&transport);

    manager.connect(Some("s3cret".into())).await;
    assert!(manager.is_connected());

    transport.close_server();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    wait_for_state(&manager, ConnectionState::Connected).await;
    assert_eq!(transport.open_count(), 3);
    assert_eq!(manager.reconnect_attempts(), 0);

    let gaps = transport.open_gaps();
    assert_close_to(gaps[1], Duration::from_secs(2));
    for url in transport.urls() {
        assert_eq!(url, format!("{}?token=s3cret", TEST_URL));
    }
}

#[tokio::test(start_paused = true)]
async fn test_last_lease_disconnects() {
    let transport = FakeTransport::accepting();
    let (manager, _dispatcher) = manager(&transport);

    let first = manager.acquire(None).await;
    let second = manager.acquire(None).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(manager.lease_count(), 2);

    drop(first);
    assert!(manager.is_connected());

    drop(second);
    assert_eq!(manager.lease_count(), 0);
    assert_eq!(manager.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_frames_dispatched_in_arrival_order() {
    let transport = FakeTransport::accepting();
    let (manager, dispatcher) = manager(&transport);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let _sub = dispatcher.subscribe(Topic::All, move |event| s.lock().push(event.event_type));

    manager.connect(None).await;
    transport.push_frame(r#"{"type":"order.created","data":{},"timestamp":"2024-05-01T10:00:00Z"}"#);
    transport.push_frame("{broken");
    transport.push_frame(r#"{"type":"payment.processed","data":{},"timestamp":"2024-05-01T10:00:01Z"}"#);
    transport.push_frame(r#"{"type":"order.updated","data":{},"timestamp":"2024-05-01T10:00:02Z"}"#);
    settle().await;

    assert_eq!(
        *seen.lock(),
        vec![
            EventType::OrderCreated,
            EventType::PaymentProcessed,
            EventType::OrderUpdated
        ]
    );
    let stats = dispatcher.stats();
    assert_eq!(stats.frames_received, 4);
    assert_eq!(stats.frames_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_state_changes_report_give_up() {
    let transport = FakeTransport::refusing();
    let (manager, _dispatcher) = manager(&transport);
    let mut states = manager.state_changes();

    manager.connect(None).await;

    let mut observed = Vec::new();
    while *states.borrow() != ConnectionState::GaveUp {
        states.changed().await.unwrap();
        observed.push(*states.borrow_and_update());
    }
    assert_eq!(observed.last(), Some(&ConnectionState::GaveUp));
    assert!(observed.contains(&ConnectionState::Reconnecting));
}
