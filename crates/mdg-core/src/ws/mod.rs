//! WebSocket transport: the connector seam used by the feed supervisor and
//! its tokio-tungstenite implementation.

pub mod client;
pub mod transport;

pub use client::TungsteniteConnector;
pub use transport::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, Connector, Endpoint, Frame, FrameSink, PingPayload, Socket, SocketEvent,
    SocketStream,
};
