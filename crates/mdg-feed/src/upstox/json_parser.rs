//! Upstox JSON message builder and parser.
//!
//! Outbound frames carry a fresh `guid` and a `method` of `sub`/`unsub`.
//! Inbound market data arrives as `live_feed` (or the initial
//! `initial_feed` snapshot) keyed by instrument:
//!
//! ```json
//! {"type":"live_feed","currentTs":"1700000000123","feeds":{
//!   "NSE_EQ|RELIANCE":{"ltpc":{"ltp":2501.35,"ltt":"1700000000100","ltq":"5","cp":2480.1}}}}
//! ```
//!
//! `full` mode nests the same `ltpc` under `ff.marketFF` together with the
//! order book (`marketLevel.bidAskQuote`) and day volume (`eFeedDetails.vtt`).

use mdg_core::time_util;
use mdg_core::types::{MarketTick, Provider, SubscriptionType};
use serde_json::{Value, json};

use super::from_instrument_key;
use crate::json_util::{change_from_close, parse_f64_field, parse_u64_field, str_field};
use crate::protocol::MessageKind;

/// Feed mode requested for a subscription type.
pub fn mode_for(kind: SubscriptionType) -> &'static str {
    match kind {
        SubscriptionType::Quotes | SubscriptionType::Trades => "ltpc",
        SubscriptionType::Depth => "full",
    }
}

pub fn wire_key(instrument_key: &str, kind: SubscriptionType) -> String {
    format!("{}|{instrument_key}", mode_for(kind))
}

pub fn build_subscribe(instrument_key: &str, kind: SubscriptionType) -> String {
    json!({
        "guid": uuid::Uuid::new_v4().to_string(),
        "method": "sub",
        "data": { "mode": mode_for(kind), "instrumentKeys": [instrument_key] }
    })
    .to_string()
}

pub fn build_unsubscribe(instrument_key: &str, kind: SubscriptionType) -> String {
    json!({
        "guid": uuid::Uuid::new_v4().to_string(),
        "method": "unsub",
        "data": { "mode": mode_for(kind), "instrumentKeys": [instrument_key] }
    })
    .to_string()
}

pub fn classify(v: &Value) -> MessageKind {
    if str_field(v, "status") == Some("error") {
        let msg = str_field(v, "message").unwrap_or("unspecified provider error");
        return MessageKind::Error(msg.to_string());
    }
    match str_field(v, "type") {
        Some("live_feed") | Some("initial_feed") => MessageKind::MarketData,
        Some("ack") => MessageKind::SubscriptionConfirmation,
        Some("pong") => MessageKind::HeartbeatResponse,
        Some("error") => {
            MessageKind::Error(str_field(v, "message").unwrap_or("unspecified provider error").to_string())
        }
        _ => MessageKind::Unrecognized,
    }
}

/// Normalize every instrument in a feed message.
pub fn parse_feeds(v: &Value) -> Vec<MarketTick> {
    let Some(feeds) = v.get("feeds").and_then(Value::as_object) else {
        return vec![];
    };
    let current_ts = parse_u64_field(v, "currentTs").unwrap_or(0);

    feeds.iter().filter_map(|(key, feed)| parse_feed(key, feed, current_ts)).collect()
}

fn parse_feed(instrument_key: &str, feed: &Value, current_ts: u64) -> Option<MarketTick> {
    let market_ff = feed.get("ff").and_then(|ff| ff.get("marketFF").or_else(|| ff.get("indexFF")));

    let ltpc = feed.get("ltpc").or_else(|| market_ff.and_then(|m| m.get("ltpc")))?;
    let price = parse_f64_field(ltpc, "ltp")?;
    let (change, change_percent) = change_from_close(price, parse_f64_field(ltpc, "cp"));

    let best = market_ff
        .and_then(|m| m.get("marketLevel"))
        .and_then(|l| l.get("bidAskQuote"))
        .and_then(Value::as_array)
        .and_then(|levels| levels.first());

    let volume = market_ff
        .and_then(|m| m.get("eFeedDetails"))
        .and_then(|d| parse_f64_field(d, "vtt"))
        .or_else(|| parse_f64_field(ltpc, "ltq"));

    let ts = parse_u64_field(ltpc, "ltt").unwrap_or(current_ts);

    Some(MarketTick {
        timestamp: time_util::epoch_to_ms(ts),
        provider: Provider::Upstox.to_string(),
        symbol: from_instrument_key(instrument_key),
        price,
        volume,
        change,
        change_percent,
        bid: best.and_then(|b| parse_f64_field(b, "bp")),
        ask: best.and_then(|b| parse_f64_field(b, "ap")),
        kind: if best.is_some() { SubscriptionType::Depth } else { SubscriptionType::Quotes },
    })
}
