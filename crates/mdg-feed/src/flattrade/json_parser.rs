//! Flattrade JSON message builder and parser.
//!
//! Every message carries a one- or two-letter `t` discriminator:
//!
//! | `t`          | meaning                                      |
//! |--------------|----------------------------------------------|
//! | `t` / `d`    | subscribe touchline / depth (outbound)       |
//! | `u` / `ud`   | unsubscribe touchline / depth (outbound)     |
//! | `tk` / `dk`  | subscription acknowledgement with snapshot   |
//! | `tf` / `df`  | incremental touchline / depth feed           |
//! | `ck`         | connect acknowledgement (`s` = `OK` or error) |
//! | `h`          | heartbeat echo                               |
//!
//! Feed example:
//!
//! ```json
//! {"t":"tf","e":"NSE","tk":"22","lp":"3602.05","pc":"0.85","v":"425431","bp1":"3601.9","sp1":"3602.05","ft":"1700000000"}
//! ```
//!
//! Incremental feeds only carry changed fields, so a `tf` without `lp` is
//! dropped rather than emitted with a stale price.

use mdg_core::time_util;
use mdg_core::types::{MarketTick, Provider, SubscriptionType};
use serde_json::{Value, json};

use super::from_exchange_token;
use crate::json_util::{change_from_close, parse_f64_field, parse_u64_field, str_field};
use crate::protocol::MessageKind;

/// Touchline carries both quotes and last-trade fields; only depth has its
/// own feed.
fn feed_for(kind: SubscriptionType) -> &'static str {
    match kind {
        SubscriptionType::Depth => "d",
        SubscriptionType::Quotes | SubscriptionType::Trades => "t",
    }
}

pub fn wire_key(scrip: &str, kind: SubscriptionType) -> String {
    format!("{}|{scrip}", feed_for(kind))
}

pub fn build_subscribe(scrip: &str, kind: SubscriptionType) -> String {
    json!({ "t": feed_for(kind), "k": scrip }).to_string()
}

pub fn build_unsubscribe(scrip: &str, kind: SubscriptionType) -> String {
    let t = match kind {
        SubscriptionType::Depth => "ud",
        SubscriptionType::Quotes | SubscriptionType::Trades => "u",
    };
    json!({ "t": t, "k": scrip }).to_string()
}

pub fn classify(v: &Value) -> MessageKind {
    match str_field(v, "t") {
        Some("tf") | Some("df") => MessageKind::MarketData,
        Some("tk") | Some("dk") | Some("uk") | Some("udk") => MessageKind::SubscriptionConfirmation,
        Some("h") => MessageKind::HeartbeatResponse,
        Some("ck") => {
            if str_field(v, "s").is_some_and(|s| s.eq_ignore_ascii_case("ok")) {
                MessageKind::SubscriptionConfirmation
            } else {
                let msg = str_field(v, "emsg").unwrap_or("connect rejected");
                MessageKind::Error(msg.to_string())
            }
        }
        _ => MessageKind::Unrecognized,
    }
}

/// Parse a `tf`/`df` feed message into a tick.
pub fn parse_touchline(v: &Value) -> Option<MarketTick> {
    let token = str_field(v, "tk")?;
    let price = parse_f64_field(v, "lp")?;

    // `c` is the previous close; `pc` is the provider-computed percent change.
    let (change, mut change_percent) = change_from_close(price, parse_f64_field(v, "c"));
    if let Some(pc) = parse_f64_field(v, "pc") {
        change_percent = Some(pc);
    }

    let kind = match str_field(v, "t") {
        Some("df") => SubscriptionType::Depth,
        _ => SubscriptionType::Quotes,
    };

    Some(MarketTick {
        timestamp: time_util::epoch_to_ms(parse_u64_field(v, "ft").unwrap_or(0)),
        provider: Provider::Flattrade.to_string(),
        symbol: from_exchange_token(str_field(v, "e"), token),
        price,
        volume: parse_f64_field(v, "v"),
        change,
        change_percent,
        bid: parse_f64_field(v, "bp1"),
        ask: parse_f64_field(v, "sp1"),
        kind,
    })
}
