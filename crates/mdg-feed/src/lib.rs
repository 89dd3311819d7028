//! # mdg-feed
//!
//! Realtime market data feeds for Indian broker WebSockets.
//!
//! ## Architecture
//!
//! Each provider is a [`ProtocolAdapter`] that builds its wire payloads and
//! normalizes its market data into [`MarketTick`](mdg_core::MarketTick)s.
//! The [`ConnectionSupervisor`] is provider-agnostic: it opens sockets
//! through a [`Connector`](mdg_core::ws::Connector), keeps them alive,
//! replays subscriptions after reconnects, and publishes [`FeedEvent`]s.
//!
//! ## Shared infrastructure
//!
//! - [`protocol`] — adapter trait and inbound frame decoding
//! - [`registry`] — provider → adapter lookup
//! - [`json_util`] — JSON parsing helpers
//! - `testing` — scripted in-memory connector (`testing` feature)

pub mod connection;
pub mod event;
pub mod flattrade;
pub mod fyers;
pub mod json_util;
pub mod protocol;
pub mod registry;
pub mod supervisor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod upstox;

pub use connection::{ConnectionConfig, ConnectionSnapshot};
pub use event::{FeedEvent, FeedEventReceiver, FeedEventSender};
pub use protocol::{Inbound, MessageKind, ProtocolAdapter};
pub use registry::AdapterRegistry;
pub use supervisor::{ConnectionSupervisor, SupervisorStats};
