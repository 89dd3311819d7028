//! Transport abstraction between the supervisor and a concrete socket.
//!
//! A [`Connector`] opens a [`Socket`], which is already split into a write
//! half ([`FrameSink`]) and a read half ([`SocketStream`]) so that a driver
//! loop can `select!` on inbound events while writing.

use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::Result;

/// Normal closure, used for manual/intentional closes.
pub const CLOSE_NORMAL: u16 = 1000;

/// Abnormal closure (no close frame received).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Standard WebSocket ping control frame.
    Ping,
}

/// Inbound event on a socket's read half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    Binary(Vec<u8>),
    /// Reply to a control-frame ping.
    Pong,
    Closed { code: u16, reason: String },
    Error(String),
}

/// Heartbeat payload format, which varies by provider.
#[derive(Debug, Clone, PartialEq)]
pub enum PingPayload {
    /// Send a text frame (e.g. `"ping"`).
    Text(String),
    /// Send a JSON object as text (e.g. `{"t":"h"}`).
    Json(serde_json::Value),
    /// Use the standard WebSocket ping frame.
    WebSocketPing,
}

impl PingPayload {
    pub fn to_frame(&self) -> Frame {
        match self {
            Self::Text(t) => Frame::Text(t.clone()),
            Self::Json(j) => Frame::Text(j.to_string()),
            Self::WebSocketPing => Frame::Ping,
        }
    }
}

/// Where and how to open a socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    /// Full WebSocket URL.
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub headers: HashMap<String, String>,
}

/// Write half of an open socket.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Send a close frame with `code` and stop writing.
    async fn close(&mut self, code: u16) -> Result<()>;
}

/// Read half of an open socket. Ends (`None`) when the transport is gone.
pub type SocketStream = BoxStream<'static, SocketEvent>;

/// An open, split socket.
pub struct Socket {
    pub sink: Box<dyn FrameSink>,
    pub stream: SocketStream,
}

/// Opens sockets. Implementations must be cheap to share across tasks.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Socket>;
}
