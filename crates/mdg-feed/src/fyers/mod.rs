//! Fyers data socket.
//!
//! Symbols use the `EXCHANGE:TICKER-SERIES` form (`NSE:SBIN-EQ`). Bare
//! tickers are expanded to NSE cash equities. The socket is kept alive with
//! a plain-text `ping`, answered by `pong`.

pub mod json_parser;

use mdg_core::error::Result;
use mdg_core::types::{MarketTick, Provider, SubscriptionKey};
use mdg_core::ws::PingPayload;
use serde_json::Value;

use crate::protocol::{MessageKind, ProtocolAdapter};

pub const FYERS_WS_URL: &str = "wss://socket.fyers.in/hsm/v1-5/prod";

/// Fyers protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct FyersAdapter;

impl ProtocolAdapter for FyersAdapter {
    fn provider(&self) -> Provider {
        Provider::Fyers
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_request("subscribe", &to_fyers_symbol(&key.symbol), key.kind))
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_request("unsubscribe", &to_fyers_symbol(&key.symbol), key.kind))
    }

    fn wire_key(&self, key: &SubscriptionKey) -> String {
        json_parser::wire_key(&to_fyers_symbol(&key.symbol), key.kind)
    }

    fn heartbeat(&self) -> PingPayload {
        PingPayload::Text("ping".to_string())
    }

    fn is_heartbeat_text(&self, text: &str) -> bool {
        text.eq_ignore_ascii_case("pong")
    }

    fn classify(&self, msg: &Value) -> MessageKind {
        json_parser::classify(msg)
    }

    fn normalize(&self, msg: &Value) -> Vec<MarketTick> {
        json_parser::parse_update(msg)
    }
}

/// `SBIN` → `NSE:SBIN-EQ`. Already-qualified symbols pass through.
pub fn to_fyers_symbol(symbol: &str) -> String {
    if symbol.contains(':') {
        symbol.to_string()
    } else {
        format!("NSE:{symbol}-EQ")
    }
}

/// Inverse of [`to_fyers_symbol`] for NSE cash equities.
pub fn from_fyers_symbol(symbol: &str) -> String {
    symbol
        .strip_prefix("NSE:")
        .and_then(|s| s.strip_suffix("-EQ"))
        .map(str::to_string)
        .unwrap_or_else(|| symbol.to_string())
}
