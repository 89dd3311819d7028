//! Provider protocol strategy.
//!
//! Each realtime provider is one [`ProtocolAdapter`]: it builds the wire
//! payloads for subscribe/unsubscribe/heartbeat, classifies inbound JSON, and
//! maps market data into [`MarketTick`]s. Adding a provider means adding one
//! adapter; the supervisor never switches on provider names.

use mdg_core::error::Result;
use mdg_core::types::{MarketTick, Provider, SubscriptionKey};
use mdg_core::ws::PingPayload;
use serde_json::Value;

/// Classification of one inbound JSON message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    HeartbeatResponse,
    SubscriptionConfirmation,
    MarketData,
    /// Provider-declared error, with its message.
    Error(String),
    Unrecognized,
}

/// Per-provider wire protocol.
pub trait ProtocolAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Wire payload subscribing to `key`.
    fn build_subscribe(&self, key: &SubscriptionKey) -> Result<String>;

    /// Wire payload cancelling `key`.
    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Result<String>;

    /// Identity of the provider-side channel `key` is carried on. Keys with
    /// equal wire keys share one upstream subscription.
    fn wire_key(&self, key: &SubscriptionKey) -> String {
        key.to_string()
    }

    /// Keep-alive sent every heartbeat interval.
    fn heartbeat(&self) -> PingPayload;

    /// Non-JSON text frames that acknowledge a heartbeat (e.g. `"pong"`).
    fn is_heartbeat_text(&self, _text: &str) -> bool {
        false
    }

    fn classify(&self, msg: &Value) -> MessageKind;

    /// Map a market-data message into normalized ticks. Unknown fields are
    /// dropped; entries without a usable price are skipped.
    fn normalize(&self, msg: &Value) -> Vec<MarketTick>;
}

/// Result of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Heartbeat,
    Confirmation(Value),
    MarketData(Vec<MarketTick>),
    ProviderError(String),
    Unrecognized,
    /// Not JSON (and not a known heartbeat reply).
    Invalid(String),
}

/// Parse, classify, and normalize one text frame.
pub fn decode(adapter: &dyn ProtocolAdapter, text: &str) -> Inbound {
    if adapter.is_heartbeat_text(text.trim()) {
        return Inbound::Heartbeat;
    }

    let v: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return Inbound::Invalid(e.to_string()),
    };

    match adapter.classify(&v) {
        MessageKind::HeartbeatResponse => Inbound::Heartbeat,
        MessageKind::SubscriptionConfirmation => Inbound::Confirmation(v),
        MessageKind::MarketData => Inbound::MarketData(adapter.normalize(&v)),
        MessageKind::Error(msg) => Inbound::ProviderError(msg),
        MessageKind::Unrecognized => Inbound::Unrecognized,
    }
}
