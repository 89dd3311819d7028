//! Upstox market data feed.
//!
//! Instrument keys are `SEGMENT|SYMBOL` (e.g. `NSE_EQ|RELIANCE`). Bare
//! symbols are assumed to be NSE equities. Keep-alive uses WebSocket ping
//! control frames, so heartbeat replies surface as socket pongs.

pub mod json_parser;

use mdg_core::error::Result;
use mdg_core::types::{MarketTick, Provider, SubscriptionKey};
use mdg_core::ws::PingPayload;
use serde_json::Value;

use crate::protocol::{MessageKind, ProtocolAdapter};

pub const UPSTOX_WS_URL: &str = "wss://api.upstox.com/v2/feed/market-data-feed";

const DEFAULT_SEGMENT: &str = "NSE_EQ";

/// Upstox protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct UpstoxAdapter;

impl ProtocolAdapter for UpstoxAdapter {
    fn provider(&self) -> Provider {
        Provider::Upstox
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_subscribe(&to_instrument_key(&key.symbol), key.kind))
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_unsubscribe(&to_instrument_key(&key.symbol), key.kind))
    }

    fn wire_key(&self, key: &SubscriptionKey) -> String {
        json_parser::wire_key(&to_instrument_key(&key.symbol), key.kind)
    }

    fn heartbeat(&self) -> PingPayload {
        PingPayload::WebSocketPing
    }

    fn classify(&self, msg: &Value) -> MessageKind {
        json_parser::classify(msg)
    }

    fn normalize(&self, msg: &Value) -> Vec<MarketTick> {
        json_parser::parse_feeds(msg)
    }
}

/// Convert a symbol to an Upstox instrument key (`RELIANCE` → `NSE_EQ|RELIANCE`).
///
/// Keys that already carry a segment are returned unchanged.
pub fn to_instrument_key(symbol: &str) -> String {
    if symbol.contains('|') {
        symbol.to_string()
    } else {
        format!("{DEFAULT_SEGMENT}|{symbol}")
    }
}

/// Inverse of [`to_instrument_key`]: the default segment is stripped.
pub fn from_instrument_key(key: &str) -> String {
    match key.split_once('|') {
        Some((DEFAULT_SEGMENT, sym)) => sym.to_string(),
        _ => key.to_string(),
    }
}
