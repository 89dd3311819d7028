//! Flattrade (Noren) market data feed.
//!
//! Scrips are addressed as `EXCHANGE|TOKEN` (e.g. `NSE|22`). Bare symbols
//! are assumed to be NSE. The session is kept alive by an application-level
//! `{"t":"h"}` message which the server echoes back.

pub mod json_parser;

use mdg_core::error::Result;
use mdg_core::types::{MarketTick, Provider, SubscriptionKey};
use mdg_core::ws::PingPayload;
use serde_json::{Value, json};

use crate::protocol::{MessageKind, ProtocolAdapter};

pub const FLATTRADE_WS_URL: &str = "wss://piconnect.flattrade.in/PiConnectWSTp/";

const DEFAULT_EXCHANGE: &str = "NSE";

/// Flattrade protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct FlattradeAdapter;

impl ProtocolAdapter for FlattradeAdapter {
    fn provider(&self) -> Provider {
        Provider::Flattrade
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_subscribe(&to_scrip_key(&key.symbol), key.kind))
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Result<String> {
        Ok(json_parser::build_unsubscribe(&to_scrip_key(&key.symbol), key.kind))
    }

    fn wire_key(&self, key: &SubscriptionKey) -> String {
        json_parser::wire_key(&to_scrip_key(&key.symbol), key.kind)
    }

    fn heartbeat(&self) -> PingPayload {
        PingPayload::Json(json!({ "t": "h" }))
    }

    fn classify(&self, msg: &Value) -> MessageKind {
        json_parser::classify(msg)
    }

    fn normalize(&self, msg: &Value) -> Vec<MarketTick> {
        json_parser::parse_touchline(msg).into_iter().collect()
    }
}

/// `22` → `NSE|22`; keys already carrying an exchange pass through.
pub fn to_scrip_key(symbol: &str) -> String {
    if symbol.contains('|') {
        symbol.to_string()
    } else {
        format!("{DEFAULT_EXCHANGE}|{symbol}")
    }
}

/// Rebuild the caller-facing symbol from the `e`/`tk` pair of a feed message.
pub fn from_exchange_token(exchange: Option<&str>, token: &str) -> String {
    match exchange {
        None | Some(DEFAULT_EXCHANGE) => token.to_string(),
        Some(exch) => format!("{exch}|{token}"),
    }
}
