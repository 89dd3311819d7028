//! Subscription keys: the per-connection identity of a realtime subscription.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::enums::SubscriptionType;

/// `(symbol, subscription type)` pair, unique within one connection.
///
/// Used as the wire-subscribe deduplication key and as the replay entry after
/// a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
}

impl SubscriptionKey {
    pub fn new(symbol: impl Into<String>, kind: SubscriptionType) -> Self {
        Self { symbol: symbol.into(), kind }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.kind)
    }
}
