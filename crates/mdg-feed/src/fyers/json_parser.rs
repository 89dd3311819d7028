//! Fyers JSON message builder and parser.
//!
//! Requests: `{"type":"subscribe","symbols":["NSE:SBIN-EQ"],"channel":"SymbolUpdate"}`.
//! Replies to requests echo a short type (`sub`, `unsub`, `cn`) with `s`
//! set to `ok` or `error`. Updates are typed `sf` (symbol feed), `if`
//! (index feed) or `dp` (depth).

use mdg_core::time_util;
use mdg_core::types::{MarketTick, Provider, SubscriptionType};
use serde_json::{Value, json};

use super::from_fyers_symbol;
use crate::json_util::{parse_f64_field, parse_u64_field, str_field};
use crate::protocol::MessageKind;

pub fn channel_for(kind: SubscriptionType) -> &'static str {
    match kind {
        SubscriptionType::Depth => "DepthUpdate",
        SubscriptionType::Quotes | SubscriptionType::Trades => "SymbolUpdate",
    }
}

pub fn wire_key(symbol: &str, kind: SubscriptionType) -> String {
    format!("{}|{symbol}", channel_for(kind))
}

pub fn build_request(action: &str, symbol: &str, kind: SubscriptionType) -> String {
    json!({ "type": action, "symbols": [symbol], "channel": channel_for(kind) }).to_string()
}

pub fn classify(v: &Value) -> MessageKind {
    match str_field(v, "type") {
        Some("sf") | Some("if") | Some("dp") => MessageKind::MarketData,
        Some("sub") | Some("unsub") | Some("cn") | Some("ful") | Some("lit") => {
            if str_field(v, "s") == Some("error") {
                let msg = str_field(v, "message").unwrap_or("request rejected");
                MessageKind::Error(msg.to_string())
            } else {
                MessageKind::SubscriptionConfirmation
            }
        }
        Some("error") => MessageKind::Error(str_field(v, "message").unwrap_or("provider error").to_string()),
        _ => MessageKind::Unrecognized,
    }
}

/// Normalize an update. A message carries either one symbol inline or a
/// `d` array of symbol objects.
pub fn parse_update(v: &Value) -> Vec<MarketTick> {
    let kind = match str_field(v, "type") {
        Some("dp") => SubscriptionType::Depth,
        _ => SubscriptionType::Quotes,
    };
    match v.get("d").and_then(Value::as_array) {
        Some(items) => items.iter().filter_map(|item| parse_symbol(item, kind)).collect(),
        None => parse_symbol(v, kind).into_iter().collect(),
    }
}

fn parse_symbol(v: &Value, kind: SubscriptionType) -> Option<MarketTick> {
    let symbol = str_field(v, "symbol")?;
    let price = parse_f64_field(v, "ltp")?;

    Some(MarketTick {
        timestamp: time_util::epoch_to_ms(parse_u64_field(v, "exch_feed_time").unwrap_or(0)),
        provider: Provider::Fyers.to_string(),
        symbol: from_fyers_symbol(symbol),
        price,
        volume: parse_f64_field(v, "vol_traded_today"),
        change: parse_f64_field(v, "ch"),
        change_percent: parse_f64_field(v, "chp"),
        bid: parse_f64_field(v, "bid_price").or_else(|| parse_f64_field(v, "bid_price1")),
        ask: parse_f64_field(v, "ask_price").or_else(|| parse_f64_field(v, "ask_price1")),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shape() {
        let v: Value = serde_json::from_str(&build_request("subscribe", "NSE:SBIN-EQ", SubscriptionType::Quotes)).unwrap();
        assert_eq!(v, json!({"type":"subscribe","symbols":["NSE:SBIN-EQ"],"channel":"SymbolUpdate"}));
    }

    #[test]
    fn parse_symbol_feed() {
        let v: Value = serde_json::from_str(
            r#"{"type":"sf","symbol":"NSE:SBIN-EQ","ltp":612.4,"vol_traded_today":1843021,"ch":3.2,"chp":0.53,
                "bid_price":612.35,"ask_price":612.45,"exch_feed_time":1700000000}"#,
        )
        .unwrap();
        assert_eq!(classify(&v), MessageKind::MarketData);

        let ticks = parse_update(&v);
        assert_eq!(ticks.len(), 1);
        let t = &ticks[0];
        assert_eq!(t.symbol, "SBIN");
        assert_eq!(t.provider, "fyers");
        assert_eq!(t.price, 612.4);
        assert_eq!(t.change, Some(3.2));
        assert_eq!(t.change_percent, Some(0.53));
        assert_eq!(t.bid, Some(612.35));
        assert_eq!(t.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn parse_batched_depth() {
        let v: Value = serde_json::from_str(
            r#"{"type":"dp","d":[
                {"symbol":"NSE:SBIN-EQ","ltp":612.4,"bid_price1":612.35,"ask_price1":612.45},
                {"symbol":"NSE:TCS-EQ"}]}"#,
        )
        .unwrap();
        let ticks = parse_update(&v);
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].kind, SubscriptionType::Depth);
        assert_eq!(ticks[0].ask, Some(612.45));
    }

    #[test]
    fn request_replies() {
        let ok: Value = serde_json::from_str(r#"{"type":"sub","s":"ok","message":"Subscribed"}"#).unwrap();
        assert_eq!(classify(&ok), MessageKind::SubscriptionConfirmation);
        let err: Value = serde_json::from_str(r#"{"type":"sub","s":"error","message":"Invalid symbol"}"#).unwrap();
        assert_eq!(classify(&err), MessageKind::Error("Invalid symbol".into()));
    }
}
