//! Events emitted by the [`ConnectionSupervisor`](crate::ConnectionSupervisor).
//!
//! Consumers poll a [`FeedEventReceiver`] for normalized market data and
//! connection lifecycle notifications. Every event names the connection it
//! came from.

use std::time::Duration;

use mdg_core::types::{MarketTick, Provider, SubscriptionKey};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// First successful open of a connection.
    ConnectionOpened { id: String, provider: Provider },

    /// The connection is gone for good (manual close, remote normal close,
    /// or supervisor shutdown).
    ConnectionClosed { id: String, code: u16, reason: String },

    /// Transport-level failure. Followed by a reconnect attempt unless the
    /// connection was closed.
    ConnectionError { id: String, message: String },

    /// A reconnect attempt has been scheduled.
    Reconnecting {
        id: String,
        /// 1-based attempt number.
        attempt: u32,
        delay: Duration,
    },

    /// The connection is back and its subscriptions were replayed.
    Reconnected { id: String, replayed: usize, failed: usize },

    /// The reconnect budget ran out; the connection has been dropped.
    ReconnectFailed { id: String, attempts: u32 },

    Subscribed { id: String, key: SubscriptionKey },
    Unsubscribed { id: String, key: SubscriptionKey },

    /// Provider acknowledged a request.
    SubscriptionConfirmed { id: String, detail: Value },

    /// One subscription could not be re-sent after a reconnect. The key stays
    /// recorded and is retried on the next reconnect.
    SubscriptionReplayFailed { id: String, key: SubscriptionKey, reason: String },

    MarketData { id: String, tick: MarketTick },

    HeartbeatAck { id: String },

    /// Provider-declared error message. The connection stays up.
    ProviderError { id: String, message: String },

    /// An inbound frame could not be parsed. The connection stays up.
    InvalidMessage { id: String, reason: String, raw: String },
}

impl FeedEvent {
    pub fn connection_id(&self) -> &str {
        match self {
            Self::ConnectionOpened { id, .. }
            | Self::ConnectionClosed { id, .. }
            | Self::ConnectionError { id, .. }
            | Self::Reconnecting { id, .. }
            | Self::Reconnected { id, .. }
            | Self::ReconnectFailed { id, .. }
            | Self::Subscribed { id, .. }
            | Self::Unsubscribed { id, .. }
            | Self::SubscriptionConfirmed { id, .. }
            | Self::SubscriptionReplayFailed { id, .. }
            | Self::MarketData { id, .. }
            | Self::HeartbeatAck { id }
            | Self::ProviderError { id, .. }
            | Self::InvalidMessage { id, .. } => id,
        }
    }
}

/// Sender half of the feed event channel.
pub type FeedEventSender = tokio::sync::mpsc::UnboundedSender<FeedEvent>;

/// Receiver half of the feed event channel.
pub type FeedEventReceiver = tokio::sync::mpsc::UnboundedReceiver<FeedEvent>;
