//! In-memory [`Connector`] for driving the supervisor without a network.
//!
//! Every successful `connect` creates a session whose inbound side is
//! scripted through a [`SessionHandle`] and whose outbound frames are
//! recorded for inspection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use mdg_core::error::{GatewayError, Result};
use mdg_core::ws::{Connector, Endpoint, Frame, FrameSink, Socket, SocketEvent};
use tokio::sync::mpsc;

use crate::event::{FeedEvent, FeedEventReceiver};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Script {
    offline: bool,
    attempts: usize,
    sessions: Vec<SessionHandle>,
}

/// Scripted connector. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    fail_sends: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every connect attempt fails.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.script).offline = offline;
    }

    /// Make every send whose text contains `needle` fail, on all sessions.
    pub fn fail_sends_containing(&self, needle: impl Into<String>) {
        lock(&self.fail_sends).push(needle.into());
    }

    /// Total connect calls, failed ones included.
    pub fn connect_count(&self) -> usize {
        lock(&self.script).attempts
    }

    /// Successful sessions, oldest first.
    pub fn session(&self, idx: usize) -> Option<SessionHandle> {
        lock(&self.script).sessions.get(idx).cloned()
    }

    pub fn latest(&self) -> Option<SessionHandle> {
        lock(&self.script).sessions.last().cloned()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Socket> {
        let mut script = lock(&self.script);
        script.attempts += 1;
        if script.offline {
            return Err(GatewayError::Transport(format!("connection refused: {}", endpoint.url)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle { inbound: tx, state: Arc::new(Mutex::new(SessionState::default())) };
        script.sessions.push(handle.clone());

        let stream = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|ev| (ev, rx)) }).boxed();
        let sink = ScriptedSink { state: handle.state.clone(), fail_sends: self.fail_sends.clone() };
        Ok(Socket { sink: Box::new(sink), stream })
    }
}

#[derive(Default)]
struct SessionState {
    sent: Vec<Frame>,
    closed_code: Option<u16>,
}

/// Remote end of one scripted session.
#[derive(Clone)]
pub struct SessionHandle {
    inbound: mpsc::UnboundedSender<SocketEvent>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    pub fn push(&self, event: SocketEvent) {
        let _ = self.inbound.send(event);
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(SocketEvent::Text(text.into()));
    }

    /// Simulate the remote closing the socket with `code`.
    pub fn close(&self, code: u16) {
        self.push(SocketEvent::Closed { code, reason: String::new() });
    }

    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .filter_map(|f| match f {
                Frame::Text(t) => Some(t.clone()),
                Frame::Ping => None,
            })
            .collect()
    }

    /// Close code sent by the client, if it closed the session.
    pub fn closed_code(&self) -> Option<u16> {
        lock(&self.state).closed_code
    }
}

struct ScriptedSink {
    state: Arc<Mutex<SessionState>>,
    fail_sends: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        if let Frame::Text(text) = &frame {
            if lock(&self.fail_sends).iter().any(|n| text.contains(n.as_str())) {
                return Err(GatewayError::Transport("scripted send failure".into()));
            }
        }
        lock(&self.state).sent.push(frame);
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        lock(&self.state).closed_code = Some(code);
        Ok(())
    }
}

/// Receive events until one matches `pred`, skipping the rest. Gives up
/// after `within` (tokio time).
pub async fn wait_for(
    rx: &mut FeedEventReceiver,
    within: Duration,
    mut pred: impl FnMut(&FeedEvent) -> bool,
) -> Option<FeedEvent> {
    tokio::time::timeout(within, async {
        while let Some(ev) = rx.recv().await {
            if pred(&ev) {
                return Some(ev);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
