//! Normalized market data, the single record every provider feed maps into.
//!
//! # Timestamp convention
//!
//! `timestamp` is **milliseconds since Unix epoch**. Providers that only send
//! a feed time in seconds are scaled up; providers that send nothing get the
//! local receive time.

use serde::{Deserialize, Serialize};

use super::enums::SubscriptionType;

/// A provider-agnostic market data update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTick {
    pub timestamp: u64,
    pub provider: String,
    pub symbol: String,
    pub price: f64,
    pub volume: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub kind: SubscriptionType,
}

impl std::fmt::Display for MarketTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({}:{} {} px={:.2}", self.provider, self.symbol, self.kind, self.price)?;
        if let (Some(bid), Some(ask)) = (self.bid, self.ask) {
            write!(f, " bid={bid:.2} ask={ask:.2}")?;
        }
        write!(f, ")")
    }
}
