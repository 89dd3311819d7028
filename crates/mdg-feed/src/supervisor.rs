//! Realtime connection supervisor.
//!
//! The supervisor owns every live [`Connection`](ConnectionSnapshot): its
//! socket, heartbeat timer, subscription bookkeeping, and reconnect state
//! machine:
//!
//! ```text
//! connecting → connected → closed (manual or remote 1000)
//!                        ↘ reconnecting → connecting → connected (replay)
//!                                       ↘ dropped (attempts exhausted)
//! ```
//!
//! Each connection runs as one tokio task (the driver) that `select!`s over
//! shutdown, inbound frames, queued outbound frames, the heartbeat timer and
//! the optional silence watchdog. Bookkeeping lives in a single map behind a
//! std mutex that is never held across an await point, so every state
//! transition is atomic with respect to callers.
//!
//! Consumers receive [`FeedEvent`]s through the receiver returned by
//! [`ConnectionSupervisor::new`]. Transport failures never surface as
//! errors from the public API; they show up as events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ahash::AHashMap;
use futures_util::StreamExt;
use mdg_core::error::{GatewayError, Result};
use mdg_core::time_util;
use mdg_core::types::{ConnectionStatus, MarketTick, SubscriptionKey, SubscriptionType};
use mdg_core::ws::{CLOSE_NORMAL, Connector, Frame, Socket, SocketEvent};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionConfig, ConnectionSnapshot, backoff_delay};
use crate::event::{FeedEvent, FeedEventReceiver, FeedEventSender};
use crate::protocol::{Inbound, ProtocolAdapter, decode};
use crate::registry::AdapterRegistry;

/// Aggregate counters across all connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub total_connections: usize,
    pub active_connections: usize,
    pub reconnect_attempts: u64,
    pub messages_received: u64,
    pub invalid_messages: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    reconnect_attempts: AtomicU64,
    messages_received: AtomicU64,
    invalid_messages: AtomicU64,
    errors: AtomicU64,
}

struct Entry {
    /// Distinguishes this connection from a later one reusing the id.
    generation: u64,
    config: Arc<ConnectionConfig>,
    adapter: Arc<dyn ProtocolAdapter>,
    status: ConnectionStatus,
    subscriptions: Vec<SubscriptionKey>,
    reconnect_count: u32,
    last_heartbeat_at: Option<u64>,
    /// Queue into the current session. Replaced on every reconnect.
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl Entry {
    fn snapshot(&self, id: &str) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: id.to_string(),
            provider: self.config.provider,
            url: self.config.endpoint.url.clone(),
            status: self.status,
            subscriptions: self.subscriptions.clone(),
            reconnect_count: self.reconnect_count,
            heartbeat_interval_ms: self.config.heartbeat_interval.as_millis() as u64,
            reconnect_interval_ms: self.config.reconnect_interval.as_millis() as u64,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            last_heartbeat_at: self.last_heartbeat_at,
        }
    }
}

struct Shared {
    connector: Arc<dyn Connector>,
    adapters: AdapterRegistry,
    entries: Mutex<AHashMap<String, Entry>>,
    events: FeedEventSender,
    active: AtomicBool,
    next_generation: AtomicU64,
    counters: Counters,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, AHashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: FeedEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }

    /// Run `f` on the entry for `id` if it still belongs to `generation`.
    fn with_entry<R>(&self, id: &str, generation: u64, f: impl FnOnce(&mut Entry) -> R) -> Option<R> {
        let mut entries = self.entries();
        match entries.get_mut(id) {
            Some(entry) if entry.generation == generation => Some(f(entry)),
            _ => None,
        }
    }

    fn remove_entry(&self, id: &str, generation: u64) -> Option<Entry> {
        let mut entries = self.entries();
        if entries.get(id).is_some_and(|e| e.generation == generation) {
            entries.remove(id)
        } else {
            None
        }
    }
}

/// Supervises realtime provider connections. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
}

impl ConnectionSupervisor {
    /// Create a supervisor and the receiver for its events.
    pub fn new(connector: Arc<dyn Connector>, adapters: AdapterRegistry) -> (Self, FeedEventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Shared {
            connector,
            adapters,
            entries: Mutex::new(AHashMap::new()),
            events,
            active: AtomicBool::new(true),
            next_generation: AtomicU64::new(1),
            counters: Counters::default(),
        };
        (Self { shared: Arc::new(shared) }, rx)
    }

    /// Open a new supervised connection and wait for the first open.
    ///
    /// An id that is already supervised is a no-op returning the existing
    /// connection. If the socket cannot be opened the connection is not
    /// recorded and no reconnect is scheduled.
    pub async fn create_connection(&self, id: &str, config: ConnectionConfig) -> Result<ConnectionSnapshot> {
        let shared = &self.shared;
        if !shared.active.load(Ordering::Acquire) {
            return Err(GatewayError::ConnectionCreation { id: id.to_string(), reason: "supervisor is shut down".into() });
        }
        let adapter = shared.adapters.get(config.provider).ok_or_else(|| GatewayError::ConnectionCreation {
            id: id.to_string(),
            reason: format!("no protocol adapter for provider '{}'", config.provider),
        })?;

        let config = Arc::new(config);
        let generation = shared.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = shared.entries();
            if let Some(existing) = entries.get(id) {
                debug!("[feed:{id}] already supervised, returning existing connection");
                return Ok(existing.snapshot(id));
            }
            entries.insert(
                id.to_string(),
                Entry {
                    generation,
                    config: config.clone(),
                    adapter: adapter.clone(),
                    status: ConnectionStatus::Connecting,
                    subscriptions: Vec::new(),
                    reconnect_count: 0,
                    last_heartbeat_at: None,
                    outbound: None,
                    shutdown: None,
                    task: None,
                },
            );
        }

        info!("[feed:{id}] connecting to {} ({})", config.endpoint.url, config.provider);
        let socket = match shared.connector.connect(&config.endpoint).await {
            Ok(s) => s,
            Err(e) => {
                shared.remove_entry(id, generation);
                warn!("[feed:{id}] initial connect failed: {e}");
                return Err(GatewayError::ConnectionCreation { id: id.to_string(), reason: e.to_string() });
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let snapshot = {
            let mut entries = shared.entries();
            let Some(entry) = entries.get_mut(id).filter(|e| e.generation == generation) else {
                return Err(GatewayError::ConnectionCreation {
                    id: id.to_string(),
                    reason: "connection was closed while connecting".into(),
                });
            };
            entry.status = ConnectionStatus::Connected;
            entry.outbound = Some(outbound_tx);
            entry.shutdown = Some(shutdown_tx);

            let driver = Driver {
                shared: shared.clone(),
                id: id.to_string(),
                generation,
                config: config.clone(),
                adapter,
                shutdown_rx,
            };
            entry.task = Some(tokio::spawn(driver.run(socket, outbound_rx)));
            entry.snapshot(id)
        };

        info!("[feed:{id}] connected");
        shared.emit(FeedEvent::ConnectionOpened { id: id.to_string(), provider: config.provider });
        Ok(snapshot)
    }

    /// Subscribe `symbol`/`kind` on a connected connection.
    ///
    /// Returns `Ok(false)` if the key was already subscribed (nothing is
    /// sent). No frame is sent either when another recorded key already
    /// holds the same provider channel. The key is recorded even if the
    /// frame cannot be queued; it is replayed on the next reconnect.
    pub fn subscribe(&self, id: &str, symbol: &str, kind: SubscriptionType) -> Result<bool> {
        let key = SubscriptionKey::new(symbol, kind);
        {
            let mut entries = self.shared.entries();
            let entry = entries.get_mut(id).ok_or_else(|| GatewayError::UnknownConnection(id.to_string()))?;
            if entry.status != ConnectionStatus::Connected {
                return Err(GatewayError::ConnectionUnavailable { id: id.to_string(), status: entry.status });
            }
            if entry.subscriptions.contains(&key) {
                debug!("[feed:{id}] {key} already subscribed");
                return Ok(false);
            }
            let wire = entry.adapter.wire_key(&key);
            let on_wire = entry.subscriptions.iter().any(|k| entry.adapter.wire_key(k) == wire);
            let payload = if on_wire { None } else { Some(entry.adapter.build_subscribe(&key)?) };
            entry.subscriptions.push(key.clone());
            match (payload, &entry.outbound) {
                (Some(payload), Some(tx)) => {
                    let _ = tx.send(Frame::Text(payload));
                }
                (None, _) => debug!("[feed:{id}] {key} shares channel '{wire}', nothing sent"),
                _ => {}
            }
        }

        debug!("[feed:{id}] subscribed {key}");
        self.shared.emit(FeedEvent::Subscribed { id: id.to_string(), key });
        Ok(true)
    }

    /// Subscribe several symbols, reporting each one separately.
    pub fn subscribe_many(&self, id: &str, symbols: &[String], kind: SubscriptionType) -> Vec<(String, Result<bool>)> {
        symbols.iter().map(|s| (s.clone(), self.subscribe(id, s, kind))).collect()
    }

    /// Drop `symbol`/`kind` from the connection's bookkeeping.
    ///
    /// The unsubscribe frame is only sent while connected and only once no
    /// other recorded key shares the provider channel; the key is removed
    /// regardless so it is not replayed after a reconnect. Returns whether
    /// the key was recorded.
    pub fn unsubscribe(&self, id: &str, symbol: &str, kind: SubscriptionType) -> Result<bool> {
        let key = SubscriptionKey::new(symbol, kind);
        {
            let mut entries = self.shared.entries();
            let entry = entries.get_mut(id).ok_or_else(|| GatewayError::UnknownConnection(id.to_string()))?;
            let Some(pos) = entry.subscriptions.iter().position(|k| *k == key) else {
                return Ok(false);
            };
            entry.subscriptions.remove(pos);

            let wire = entry.adapter.wire_key(&key);
            let still_used = entry.subscriptions.iter().any(|k| entry.adapter.wire_key(k) == wire);
            if still_used {
                debug!("[feed:{id}] channel '{wire}' still in use, keeping it open");
            } else if entry.status == ConnectionStatus::Connected {
                match entry.adapter.build_unsubscribe(&key) {
                    Ok(payload) => {
                        if let Some(tx) = &entry.outbound {
                            let _ = tx.send(Frame::Text(payload));
                        }
                    }
                    Err(e) => warn!("[feed:{id}] unsubscribe payload for {key}: {e}"),
                }
            }
        }

        debug!("[feed:{id}] unsubscribed {key}");
        self.shared.emit(FeedEvent::Unsubscribed { id: id.to_string(), key });
        Ok(true)
    }

    /// Manually close a connection with code 1000. No reconnect follows and
    /// all of its state is dropped.
    pub async fn close_connection(&self, id: &str) -> Result<()> {
        self.close_with_reason(id, "closed by client").await
    }

    async fn close_with_reason(&self, id: &str, reason: &str) -> Result<()> {
        let entry = self.shared.entries().remove(id).ok_or_else(|| GatewayError::UnknownConnection(id.to_string()))?;

        if let Some(tx) = &entry.shutdown {
            let _ = tx.send(true);
        }
        if let Some(task) = entry.task {
            let _ = task.await;
        }

        info!("[feed:{id}] closed ({reason})");
        self.shared.emit(FeedEvent::ConnectionClosed { id: id.to_string(), code: CLOSE_NORMAL, reason: reason.to_string() });
        Ok(())
    }

    /// Stop reconnecting and close every connection.
    pub async fn shutdown(&self) {
        self.shared.active.store(false, Ordering::Release);
        for id in self.connection_ids() {
            let _ = self.close_with_reason(&id, "supervisor shutdown").await;
        }
        info!("[feed] supervisor shut down");
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn connection(&self, id: &str) -> Option<ConnectionSnapshot> {
        self.shared.entries().get(id).map(|e| e.snapshot(id))
    }

    /// Ids of all supervised connections, sorted.
    pub fn connection_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.entries().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connections(&self) -> Vec<ConnectionSnapshot> {
        let entries = self.shared.entries();
        let mut out: Vec<_> = entries.iter().map(|(id, e)| e.snapshot(id)).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn stats(&self) -> SupervisorStats {
        let (total, active) = {
            let entries = self.shared.entries();
            let active = entries.values().filter(|e| e.status == ConnectionStatus::Connected).count();
            (entries.len(), active)
        };
        let c = &self.shared.counters;
        SupervisorStats {
            total_connections: total,
            active_connections: active,
            reconnect_attempts: c.reconnect_attempts.load(Ordering::Relaxed),
            messages_received: c.messages_received.load(Ordering::Relaxed),
            invalid_messages: c.invalid_messages.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
        }
    }
}

/// Why a session ended.
enum SessionEnd {
    Shutdown,
    RemoteClose { code: u16, reason: String },
    Lost(String),
}

/// Background task owning one connection's socket.
struct Driver {
    shared: Arc<Shared>,
    id: String,
    generation: u64,
    config: Arc<ConnectionConfig>,
    adapter: Arc<dyn ProtocolAdapter>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn run(mut self, mut socket: Socket, mut outbound_rx: mpsc::UnboundedReceiver<Frame>) {
        let id = self.id.clone();
        self.prime(&mut socket, &[]).await;

        loop {
            match self.session(&mut socket, &mut outbound_rx).await {
                SessionEnd::Shutdown => {
                    let _ = socket.sink.close(CLOSE_NORMAL).await;
                    return;
                }
                SessionEnd::RemoteClose { code: CLOSE_NORMAL, reason } => {
                    info!("[feed:{id}] closed by remote (1000): {reason}");
                    if self.shared.remove_entry(&id, self.generation).is_some() {
                        self.shared.emit(FeedEvent::ConnectionClosed { id: id.clone(), code: CLOSE_NORMAL, reason });
                    }
                    return;
                }
                SessionEnd::RemoteClose { code, reason } => {
                    warn!("[feed:{id}] connection closed ({code}): {reason}");
                    self.shared.counters.errors.fetch_add(1, Ordering::Relaxed);
                    self.shared
                        .emit(FeedEvent::ConnectionError { id: id.clone(), message: format!("closed with code {code}: {reason}") });
                }
                SessionEnd::Lost(reason) => {
                    warn!("[feed:{id}] connection lost: {reason}");
                    self.shared.counters.errors.fetch_add(1, Ordering::Relaxed);
                    self.shared.emit(FeedEvent::ConnectionError { id: id.clone(), message: reason });
                }
            }

            match self.reconnect().await {
                Some((s, rx)) => {
                    socket = s;
                    outbound_rx = rx;
                }
                None => return,
            }
        }
    }

    /// Send the auth payload, then replay `keys` in order. Each replay is
    /// independent; a key whose channel was already re-opened by an earlier
    /// key counts as replayed without another frame. Returns
    /// `(replayed, failed)`.
    async fn prime(&self, socket: &mut Socket, keys: &[SubscriptionKey]) -> (usize, usize) {
        let id = &self.id;
        if let Some(auth) = &self.config.auth_payload {
            if let Err(e) = socket.sink.send(Frame::Text(auth.clone())).await {
                warn!("[feed:{id}] auth payload send failed: {e}");
            }
        }

        let (mut replayed, mut failed) = (0, 0);
        let mut opened: Vec<String> = Vec::new();
        for key in keys {
            let wire = self.adapter.wire_key(key);
            if opened.contains(&wire) {
                replayed += 1;
                continue;
            }
            let sent = match self.adapter.build_subscribe(key) {
                Ok(payload) => socket.sink.send(Frame::Text(payload)).await,
                Err(e) => Err(e),
            };
            match sent {
                Ok(()) => {
                    debug!("[feed:{id}] replayed {key}");
                    opened.push(wire);
                    replayed += 1;
                }
                Err(e) => {
                    warn!("[feed:{id}] replay of {key} failed: {e}");
                    failed += 1;
                    self.shared.emit(FeedEvent::SubscriptionReplayFailed {
                        id: id.clone(),
                        key: key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (replayed, failed)
    }

    async fn session(&mut self, socket: &mut Socket, outbound_rx: &mut mpsc::UnboundedReceiver<Frame>) -> SessionEnd {
        let hb = self.config.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + hb, hb);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            let deadline = self.config.heartbeat_timeout.map(|t| last_inbound + t);
            let watchdog = async move {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.shutdown_rx.changed() => return SessionEnd::Shutdown,

                ev = socket.stream.next() => {
                    last_inbound = Instant::now();
                    match ev {
                        Some(SocketEvent::Text(text)) => self.handle_text(&text),
                        Some(SocketEvent::Binary(data)) => {
                            debug!("[feed:{}] ignoring {} byte binary frame", self.id, data.len());
                        }
                        Some(SocketEvent::Pong) => self.heartbeat_ack(),
                        Some(SocketEvent::Closed { code, reason }) => return SessionEnd::RemoteClose { code, reason },
                        Some(SocketEvent::Error(e)) => return SessionEnd::Lost(e),
                        None => return SessionEnd::Lost("stream ended".into()),
                    }
                }

                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = socket.sink.send(frame).await {
                        return SessionEnd::Lost(format!("send failed: {e}"));
                    }
                }

                _ = heartbeat.tick() => {
                    if let Err(e) = socket.sink.send(self.adapter.heartbeat().to_frame()).await {
                        return SessionEnd::Lost(format!("heartbeat send failed: {e}"));
                    }
                }

                _ = watchdog => {
                    let silent = self.config.heartbeat_timeout.unwrap_or_default();
                    return SessionEnd::Lost(format!("no inbound traffic for {silent:?}"));
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        let id = &self.id;
        let counters = &self.shared.counters;
        counters.messages_received.fetch_add(1, Ordering::Relaxed);

        match decode(self.adapter.as_ref(), text) {
            Inbound::Heartbeat => self.heartbeat_ack(),
            Inbound::Confirmation(detail) => {
                debug!("[feed:{id}] confirmation: {detail}");
                self.shared.emit(FeedEvent::SubscriptionConfirmed { id: id.clone(), detail });
            }
            Inbound::MarketData(ticks) => {
                for tick in ticks.into_iter().flat_map(|t| self.label(t)) {
                    self.shared.emit(FeedEvent::MarketData { id: id.clone(), tick });
                }
            }
            Inbound::ProviderError(message) => {
                counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!("[feed:{id}] provider error: {message}");
                self.shared.emit(FeedEvent::ProviderError { id: id.clone(), message });
            }
            Inbound::Unrecognized => debug!("[feed:{id}] unrecognized message: {text}"),
            Inbound::Invalid(reason) => {
                counters.invalid_messages.fetch_add(1, Ordering::Relaxed);
                let err = GatewayError::InvalidMessage { connection_id: id.clone(), reason: reason.clone() };
                warn!("[feed:{id}] {err}");
                self.shared.emit(FeedEvent::InvalidMessage { id: id.clone(), reason, raw: text.to_string() });
            }
        }
    }

    /// One copy of `tick` per subscribed kind carried on its channel, so a
    /// `trades` subscriber sees ticks labelled `trades` even when the
    /// provider serves them on the quotes feed. Ticks matching no recorded
    /// key pass through unchanged.
    fn label(&self, tick: MarketTick) -> Vec<MarketTick> {
        let wire = self.adapter.wire_key(&SubscriptionKey::new(tick.symbol.as_str(), tick.kind));
        let kinds: Vec<SubscriptionType> = self
            .shared
            .with_entry(&self.id, self.generation, |e| {
                e.subscriptions.iter().filter(|k| self.adapter.wire_key(k) == wire).map(|k| k.kind).collect()
            })
            .unwrap_or_default();

        match kinds.as_slice() {
            [] => vec![tick],
            [only] => vec![MarketTick { kind: *only, ..tick }],
            _ => kinds.into_iter().map(|kind| MarketTick { kind, ..tick.clone() }).collect(),
        }
    }

    fn heartbeat_ack(&self) {
        let now = time_util::now_ms();
        if self.shared.with_entry(&self.id, self.generation, |e| e.last_heartbeat_at = Some(now)).is_some() {
            self.shared.emit(FeedEvent::HeartbeatAck { id: self.id.clone() });
        }
    }

    /// Back off and reopen until a session is up, the budget runs out, or the
    /// connection is closed. The new session is primed before returning.
    async fn reconnect(&mut self) -> Option<(Socket, mpsc::UnboundedReceiver<Frame>)> {
        let id = self.id.clone();
        let max = self.config.max_reconnect_attempts;

        if !self.shared.active.load(Ordering::Acquire) {
            return None;
        }

        loop {
            let attempt = self.shared.with_entry(&id, self.generation, |e| {
                e.status = ConnectionStatus::Reconnecting;
                e.outbound = None;
                if e.reconnect_count >= max {
                    None
                } else {
                    e.reconnect_count += 1;
                    Some(e.reconnect_count)
                }
            })?;

            let Some(attempt) = attempt else {
                self.shared.remove_entry(&id, self.generation);
                let err = GatewayError::ReconnectExhausted { connection_id: id.clone(), attempts: max };
                error!("[feed:{id}] {err}");
                self.shared.emit(FeedEvent::ReconnectFailed { id, attempts: max });
                return None;
            };

            let delay = backoff_delay(self.config.reconnect_interval, attempt - 1);
            self.shared.counters.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
            info!("[feed:{id}] reconnect attempt {attempt}/{max} in {delay:?}");
            self.shared.emit(FeedEvent::Reconnecting { id: id.clone(), attempt, delay });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = self.shutdown_rx.changed() => return None,
            }

            self.shared.with_entry(&id, self.generation, |e| e.status = ConnectionStatus::Connecting)?;

            let connected = tokio::select! {
                res = self.shared.connector.connect(&self.config.endpoint) => res,
                _ = self.shutdown_rx.changed() => return None,
            };

            match connected {
                Ok(mut socket) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let replay = self.shared.with_entry(&id, self.generation, |e| {
                        e.status = ConnectionStatus::Connected;
                        e.reconnect_count = 0;
                        e.outbound = Some(tx);
                        e.subscriptions.clone()
                    })?;

                    let (replayed, failed) = self.prime(&mut socket, &replay).await;
                    info!("[feed:{id}] reconnected, replayed {replayed} subscriptions ({failed} failed)");
                    self.shared.emit(FeedEvent::Reconnected { id, replayed, failed });
                    return Some((socket, rx));
                }
                Err(e) => {
                    warn!("[feed:{id}] reconnect attempt {attempt} failed: {e}");
                    self.shared.counters.errors.fetch_add(1, Ordering::Relaxed);
                    self.shared.emit(FeedEvent::ConnectionError { id: id.clone(), message: e.to_string() });
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor").field("connections", &self.connection_ids()).finish()
    }
}

/// Apply a fixed set of subscriptions, logging rather than failing on
/// individual keys.
pub fn apply_subscriptions(supervisor: &ConnectionSupervisor, id: &str, keys: &[SubscriptionKey]) -> usize {
    keys.iter()
        .filter(|k| match supervisor.subscribe(id, &k.symbol, k.kind) {
            Ok(added) => added,
            Err(e) => {
                warn!("[feed:{id}] could not subscribe {k}: {e}");
                false
            }
        })
        .count()
}
