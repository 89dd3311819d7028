//! Connection lifecycle tests against the scripted connector.
//!
//! All tests run on paused tokio time, so backoff delays and heartbeat
//! intervals elapse instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use mdg_core::GatewayError;
use mdg_core::types::{ConnectionStatus, Provider, SubscriptionKey, SubscriptionType};
use mdg_core::ws::Frame;
use mdg_feed::testing::{ScriptedConnector, wait_for};
use mdg_feed::{AdapterRegistry, ConnectionConfig, ConnectionSupervisor, FeedEvent, FeedEventReceiver};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(600);

fn setup() -> (ScriptedConnector, ConnectionSupervisor, FeedEventReceiver) {
    let connector = ScriptedConnector::new();
    let (supervisor, rx) = ConnectionSupervisor::new(Arc::new(connector.clone()), AdapterRegistry::with_defaults());
    (connector, supervisor, rx)
}

fn upstox_config() -> ConnectionConfig {
    let mut cfg = ConnectionConfig::new(Provider::Upstox, "wss://feed.example.test/upstox");
    cfg.heartbeat_interval = Duration::from_millis(30_000);
    cfg.reconnect_interval = Duration::from_millis(5_000);
    cfg.max_reconnect_attempts = 3;
    cfg
}

/// Let the driver task drain its queues.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn subscribe_frames(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .filter_map(|t| serde_json::from_str::<Value>(t).ok())
        .filter(|v| v["method"] == "sub")
        .filter_map(|v| v["data"]["instrumentKeys"][0].as_str().map(str::to_string))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn subscribe_is_idempotent() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();

    assert!(sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap());
    assert!(!sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap());
    settle().await;

    let session = connector.session(0).unwrap();
    assert_eq!(subscribe_frames(&session.sent_texts()), vec!["NSE_EQ|RELIANCE"]);
    assert_eq!(
        sup.connection("c1").unwrap().subscriptions,
        vec![SubscriptionKey::new("RELIANCE", SubscriptionType::Quotes)]
    );
}

#[tokio::test(start_paused = true)]
async fn same_symbol_different_kind_is_a_separate_key() {
    let (_connector, sup, _rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();

    assert!(sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap());
    assert!(sup.subscribe("c1", "RELIANCE", SubscriptionType::Depth).unwrap());
    assert_eq!(sup.connection("c1").unwrap().subscriptions.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconnect_backoff_doubles_until_exhausted() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();

    connector.set_offline(true);
    connector.session(0).unwrap().close(1006);

    let mut delays = Vec::new();
    let failed = wait_for(&mut rx, WAIT, |ev| {
        if let FeedEvent::Reconnecting { delay, .. } = ev {
            delays.push(*delay);
        }
        matches!(ev, FeedEvent::ReconnectFailed { .. })
    })
    .await
    .expect("reconnect should give up");

    assert_eq!(
        delays,
        vec![Duration::from_millis(5_000), Duration::from_millis(10_000), Duration::from_millis(20_000)]
    );
    assert_eq!(failed, FeedEvent::ReconnectFailed { id: "c1".into(), attempts: 3 });
    assert_eq!(connector.connect_count(), 4);
    assert!(sup.connection("c1").is_none());
    assert_eq!(sup.stats().reconnect_attempts, 3);

    // Nothing further is scheduled.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.connect_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn replay_keeps_order_and_tolerates_a_failed_key() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    for sym in ["INFY", "TCS", "SBIN"] {
        sup.subscribe("c1", sym, SubscriptionType::Quotes).unwrap();
    }
    settle().await;

    connector.fail_sends_containing("TCS");
    connector.session(0).unwrap().close(1006);

    let mut replay_failures = Vec::new();
    let done = wait_for(&mut rx, WAIT, |ev| {
        if let FeedEvent::SubscriptionReplayFailed { key, .. } = ev {
            replay_failures.push(key.clone());
        }
        matches!(ev, FeedEvent::Reconnected { .. })
    })
    .await
    .expect("should reconnect");

    assert_eq!(done, FeedEvent::Reconnected { id: "c1".into(), replayed: 2, failed: 1 });
    assert_eq!(replay_failures, vec![SubscriptionKey::new("TCS", SubscriptionType::Quotes)]);
    assert_eq!(subscribe_frames(&connector.session(1).unwrap().sent_texts()), vec!["NSE_EQ|INFY", "NSE_EQ|SBIN"]);

    // The failed key stays recorded for the next cycle.
    let keys: Vec<_> = sup.connection("c1").unwrap().subscriptions.into_iter().map(|k| k.symbol).collect();
    assert_eq!(keys, vec!["INFY", "TCS", "SBIN"]);
}

#[tokio::test(start_paused = true)]
async fn abnormal_close_reconnects_and_resubscribes() {
    let (connector, sup, mut rx) = setup();
    let snap = sup.create_connection("c1", upstox_config()).await.unwrap();
    assert_eq!(snap.status, ConnectionStatus::Connected);
    assert_eq!(snap.heartbeat_interval_ms, 30_000);

    sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap();
    settle().await;

    connector.session(0).unwrap().close(1006);
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnecting { attempt: 1, .. }))
        .await
        .expect("reconnect scheduled");
    let during = sup.connection("c1").unwrap();
    assert_eq!(during.status, ConnectionStatus::Reconnecting);
    assert_eq!(during.reconnect_count, 1);

    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnected { .. })).await.expect("reconnected");
    let after = sup.connection("c1").unwrap();
    assert_eq!(after.status, ConnectionStatus::Connected);
    assert_eq!(after.reconnect_count, 0);
    assert_eq!(subscribe_frames(&connector.session(1).unwrap().sent_texts()), vec!["NSE_EQ|RELIANCE"]);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_while_down_is_not_replayed() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    sup.subscribe("c1", "INFY", SubscriptionType::Quotes).unwrap();
    sup.subscribe("c1", "TCS", SubscriptionType::Quotes).unwrap();
    settle().await;

    connector.session(0).unwrap().close(1006);
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnecting { .. })).await.unwrap();

    assert!(sup.unsubscribe("c1", "TCS", SubscriptionType::Quotes).unwrap());
    let err = sup.subscribe("c1", "SBIN", SubscriptionType::Quotes).unwrap_err();
    assert!(matches!(err, GatewayError::ConnectionUnavailable { status: ConnectionStatus::Reconnecting, .. }));

    let done = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnected { .. })).await.unwrap();
    assert_eq!(done, FeedEvent::Reconnected { id: "c1".into(), replayed: 1, failed: 0 });
    assert_eq!(subscribe_frames(&connector.session(1).unwrap().sent_texts()), vec!["NSE_EQ|INFY"]);

    // Nothing was sent for the unsubscribe on the dead session.
    let unsubs = connector.session(0).unwrap().sent_texts().iter().filter(|t| t.contains("\"unsub\"")).count();
    assert_eq!(unsubs, 0);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_while_connected_sends_frame() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    sup.subscribe("c1", "INFY", SubscriptionType::Depth).unwrap();
    assert!(sup.unsubscribe("c1", "INFY", SubscriptionType::Depth).unwrap());
    assert!(!sup.unsubscribe("c1", "INFY", SubscriptionType::Depth).unwrap());
    settle().await;

    let texts = connector.session(0).unwrap().sent_texts();
    let last: Value = serde_json::from_str(texts.last().unwrap()).unwrap();
    assert_eq!(last["method"], "unsub");
    assert_eq!(last["data"]["mode"], "full");
    assert!(sup.connection("c1").unwrap().subscriptions.is_empty());
}

fn flattrade_config() -> ConnectionConfig {
    ConnectionConfig::new(Provider::Flattrade, "wss://feed.example.test/flattrade")
}

/// `(t, k)` of every flattrade subscription frame sent on a session.
fn touchline_frames(texts: &[String]) -> Vec<(String, String)> {
    texts
        .iter()
        .filter_map(|t| serde_json::from_str::<Value>(t).ok())
        .filter_map(|v| Some((v["t"].as_str()?.to_string(), v["k"].as_str()?.to_string())))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn quotes_and_trades_share_one_channel() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("ft", flattrade_config()).await.unwrap();

    assert!(sup.subscribe("ft", "22", SubscriptionType::Quotes).unwrap());
    assert!(sup.subscribe("ft", "22", SubscriptionType::Trades).unwrap());
    settle().await;
    let session = connector.session(0).unwrap();
    assert_eq!(touchline_frames(&session.sent_texts()), vec![("t".to_string(), "NSE|22".to_string())]);

    // Quotes still ride the channel, so dropping trades must not close it.
    assert!(sup.unsubscribe("ft", "22", SubscriptionType::Trades).unwrap());
    settle().await;
    assert_eq!(touchline_frames(&session.sent_texts()).len(), 1);
    assert_eq!(
        sup.connection("ft").unwrap().subscriptions,
        vec![SubscriptionKey::new("22", SubscriptionType::Quotes)]
    );

    assert!(sup.unsubscribe("ft", "22", SubscriptionType::Quotes).unwrap());
    settle().await;
    assert_eq!(touchline_frames(&session.sent_texts()).last(), Some(&("u".to_string(), "NSE|22".to_string())));
    assert!(sup.connection("ft").unwrap().subscriptions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shared_channel_is_replayed_once() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("ft", flattrade_config()).await.unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Quotes).unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Trades).unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Depth).unwrap();
    settle().await;

    connector.session(0).unwrap().close(1006);
    let done = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnected { .. })).await.unwrap();
    assert_eq!(done, FeedEvent::Reconnected { id: "ft".into(), replayed: 3, failed: 0 });
    assert_eq!(
        touchline_frames(&connector.session(1).unwrap().sent_texts()),
        vec![("t".to_string(), "NSE|22".to_string()), ("d".to_string(), "NSE|22".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn shared_channel_ticks_reach_every_kind() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("ft", flattrade_config()).await.unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Quotes).unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Trades).unwrap();
    settle().await;

    connector.session(0).unwrap().push_text(r#"{"t":"tf","e":"NSE","tk":"22","lp":"3602.05"}"#);
    let mut kinds = Vec::new();
    wait_for(&mut rx, WAIT, |ev| {
        if let FeedEvent::MarketData { tick, .. } = ev {
            assert_eq!(tick.symbol, "22");
            assert_eq!(tick.price, 3602.05);
            kinds.push(tick.kind);
        }
        kinds.len() == 2
    })
    .await
    .expect("one tick per subscribed kind");
    kinds.sort();
    assert_eq!(kinds, vec![SubscriptionType::Quotes, SubscriptionType::Trades]);
}

#[tokio::test(start_paused = true)]
async fn trades_only_subscription_labels_ticks_as_trades() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("ft", flattrade_config()).await.unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Trades).unwrap();
    settle().await;

    connector.session(0).unwrap().push_text(r#"{"t":"tf","e":"NSE","tk":"22","lp":"3602.05"}"#);
    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::MarketData { .. })).await.unwrap();
    let FeedEvent::MarketData { tick, .. } = ev else { unreachable!() };
    assert_eq!(tick.kind, SubscriptionType::Trades);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_sent_every_interval() {
    let (connector, sup, _rx) = setup();
    let mut cfg = ConnectionConfig::new(Provider::Flattrade, "wss://feed.example.test/flattrade");
    cfg.heartbeat_interval = Duration::from_millis(1_000);
    sup.create_connection("ft", cfg).await.unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let beats = connector
        .session(0)
        .unwrap()
        .sent_texts()
        .iter()
        .filter(|t| serde_json::from_str::<Value>(t).ok() == Some(json!({"t":"h"})))
        .count();
    assert_eq!(beats, 3);
}

#[tokio::test(start_paused = true)]
async fn websocket_ping_heartbeat_and_pong_ack() {
    let (connector, sup, mut rx) = setup();
    let mut cfg = upstox_config();
    cfg.heartbeat_interval = Duration::from_millis(1_000);
    sup.create_connection("c1", cfg).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let session = connector.session(0).unwrap();
    assert_eq!(session.sent(), vec![Frame::Ping]);
    assert!(sup.connection("c1").unwrap().last_heartbeat_at.is_none());

    session.push(mdg_core::ws::SocketEvent::Pong);
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::HeartbeatAck { .. })).await.expect("ack");
    assert!(sup.connection("c1").unwrap().last_heartbeat_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn text_pong_updates_heartbeat() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("fy", ConnectionConfig::new(Provider::Fyers, "wss://feed.example.test/fyers")).await.unwrap();

    connector.session(0).unwrap().push_text("pong");
    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::HeartbeatAck { .. })).await.unwrap();
    assert_eq!(ev.connection_id(), "fy");
    assert!(sup.connection("fy").unwrap().last_heartbeat_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn silence_watchdog_forces_reconnect() {
    let (connector, sup, mut rx) = setup();
    let mut cfg = upstox_config();
    cfg.heartbeat_interval = Duration::from_secs(60);
    cfg.heartbeat_timeout = Some(Duration::from_secs(10));
    cfg.reconnect_interval = Duration::from_secs(1);
    sup.create_connection("c1", cfg).await.unwrap();

    let err = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::ConnectionError { .. })).await.unwrap();
    match err {
        FeedEvent::ConnectionError { message, .. } => assert!(message.contains("no inbound traffic")),
        other => panic!("unexpected {other:?}"),
    }
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnected { .. })).await.unwrap();
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_watchdog_by_default() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.connect_count(), 1);
    assert_eq!(sup.connection("c1").unwrap().status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn invalid_message_is_not_fatal() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    let session = connector.session(0).unwrap();

    session.push_text("{not json");
    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::InvalidMessage { .. })).await.unwrap();
    match ev {
        FeedEvent::InvalidMessage { raw, .. } => assert_eq!(raw, "{not json"),
        other => panic!("unexpected {other:?}"),
    }

    session.push_text(r#"{"type":"live_feed","feeds":{"NSE_EQ|RELIANCE":{"ltpc":{"ltp":2501.35,"ltt":"1700000000100"}}}}"#);
    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::MarketData { .. })).await.unwrap();
    match ev {
        FeedEvent::MarketData { id, tick } => {
            assert_eq!(id, "c1");
            assert_eq!(tick.symbol, "RELIANCE");
            assert_eq!(tick.provider, "upstox");
        }
        other => panic!("unexpected {other:?}"),
    }

    let stats = sup.stats();
    assert_eq!(stats.invalid_messages, 1);
    assert_eq!(stats.messages_received, 2);
    assert_eq!(sup.connection("c1").unwrap().status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn provider_error_keeps_connection() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("fy", ConnectionConfig::new(Provider::Fyers, "wss://feed.example.test/fyers")).await.unwrap();
    connector.session(0).unwrap().push_text(r#"{"type":"sub","s":"error","message":"Invalid symbol"}"#);

    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::ProviderError { .. })).await.unwrap();
    assert_eq!(ev, FeedEvent::ProviderError { id: "fy".into(), message: "Invalid symbol".into() });
    assert_eq!(sup.connection("fy").unwrap().status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn manual_close_does_not_reconnect() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap();

    sup.close_connection("c1").await.unwrap();
    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::ConnectionClosed { .. })).await.unwrap();
    assert!(matches!(ev, FeedEvent::ConnectionClosed { code: 1000, .. }));
    assert_eq!(connector.session(0).unwrap().closed_code(), Some(1000));
    assert!(sup.connection("c1").is_none());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.connect_count(), 1);
    assert!(matches!(sup.close_connection("c1").await, Err(GatewayError::UnknownConnection(_))));
}

#[tokio::test(start_paused = true)]
async fn remote_normal_close_is_terminal() {
    let (connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();

    connector.session(0).unwrap().close(1000);
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::ConnectionClosed { .. })).await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(connector.connect_count(), 1);
    assert!(sup.connection("c1").is_none());
}

#[tokio::test(start_paused = true)]
async fn duplicate_create_returns_existing() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    sup.subscribe("c1", "RELIANCE", SubscriptionType::Quotes).unwrap();

    let again = sup.create_connection("c1", ConnectionConfig::new(Provider::Fyers, "wss://other.test")).await.unwrap();
    assert_eq!(again.provider, Provider::Upstox);
    assert_eq!(again.subscriptions.len(), 1);
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_create_leaves_no_state() {
    let (connector, sup, _rx) = setup();
    connector.set_offline(true);

    let err = sup.create_connection("c1", upstox_config()).await.unwrap_err();
    assert!(matches!(err, GatewayError::ConnectionCreation { .. }));
    assert!(sup.connection_ids().is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_adapter_fails_creation() {
    let connector = ScriptedConnector::new();
    let (sup, _rx) = ConnectionSupervisor::new(Arc::new(connector.clone()), AdapterRegistry::new());
    let err = sup.create_connection("c1", upstox_config()).await.unwrap_err();
    assert!(matches!(err, GatewayError::ConnectionCreation { .. }));
    assert_eq!(connector.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_connection_is_rejected() {
    let (_connector, sup, _rx) = setup();
    assert!(matches!(
        sup.subscribe("nope", "INFY", SubscriptionType::Quotes),
        Err(GatewayError::UnknownConnection(_))
    ));
    assert!(matches!(
        sup.unsubscribe("nope", "INFY", SubscriptionType::Quotes),
        Err(GatewayError::UnknownConnection(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn auth_payload_leads_every_session() {
    let (connector, sup, mut rx) = setup();
    let mut cfg = ConnectionConfig::new(Provider::Flattrade, "wss://feed.example.test/flattrade");
    cfg.auth_payload = Some(r#"{"t":"c","uid":"FT0001"}"#.into());
    sup.create_connection("ft", cfg).await.unwrap();
    sup.subscribe("ft", "22", SubscriptionType::Quotes).unwrap();
    settle().await;

    let first = connector.session(0).unwrap().sent_texts();
    assert_eq!(first[0], r#"{"t":"c","uid":"FT0001"}"#);
    assert!(first[1].contains("NSE|22"));

    connector.session(0).unwrap().close(1006);
    wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Reconnected { .. })).await.unwrap();
    let second = connector.session(1).unwrap().sent_texts();
    assert_eq!(second[0], r#"{"t":"c","uid":"FT0001"}"#);
    assert!(second[1].contains("NSE|22"));
}

#[tokio::test(start_paused = true)]
async fn subscribe_many_reports_each_symbol() {
    let (_connector, sup, mut rx) = setup();
    sup.create_connection("c1", upstox_config()).await.unwrap();
    let symbols: Vec<String> = ["INFY", "TCS", "INFY"].iter().map(|s| s.to_string()).collect();
    let results = sup.subscribe_many("c1", &symbols, SubscriptionType::Quotes);
    let added: Vec<bool> = results.iter().map(|(_, r)| *r.as_ref().unwrap()).collect();
    assert_eq!(added, vec![true, true, false]);
    let missing = sup.subscribe_many("zz", &symbols[..1], SubscriptionType::Quotes);
    assert!(matches!(missing[0].1, Err(GatewayError::UnknownConnection(_))));

    let ev = wait_for(&mut rx, WAIT, |ev| matches!(ev, FeedEvent::Subscribed { .. })).await.unwrap();
    assert_eq!(ev, FeedEvent::Subscribed { id: "c1".into(), key: SubscriptionKey::new("INFY", SubscriptionType::Quotes) });
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_everything() {
    let (connector, sup, _rx) = setup();
    sup.create_connection("a", upstox_config()).await.unwrap();
    sup.create_connection("b", ConnectionConfig::new(Provider::Fyers, "wss://feed.example.test/fyers")).await.unwrap();
    assert_eq!(sup.stats().active_connections, 2);

    sup.shutdown().await;
    assert!(!sup.is_active());
    assert!(sup.connection_ids().is_empty());
    assert_eq!(connector.session(0).unwrap().closed_code(), Some(1000));
    assert_eq!(connector.session(1).unwrap().closed_code(), Some(1000));
    assert!(sup.create_connection("c", upstox_config()).await.is_err());
}
