//! Enumerations used throughout the gateway.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// Provider identifiers
// ---------------------------------------------------------------------------

/// Realtime feed providers with a known wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Upstox,
    Flattrade,
    Fyers,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Upstox, Provider::Flattrade, Provider::Fyers];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstox => "upstox",
            Self::Flattrade => "flattrade",
            Self::Fyers => "fyers",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upstox" => Ok(Self::Upstox),
            "flattrade" => Ok(Self::Flattrade),
            "fyers" => Ok(Self::Fyers),
            other => Err(GatewayError::UnknownProvider(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription types
// ---------------------------------------------------------------------------

/// What a realtime subscription delivers for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Quotes,
    Depth,
    Trades,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::Depth => "depth",
            Self::Trades => "trades",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quotes" | "quote" | "ltp" => Ok(Self::Quotes),
            "depth" => Ok(Self::Depth),
            "trades" | "trade" => Ok(Self::Trades),
            other => Err(GatewayError::Config(format!("unknown subscription type '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a supervised realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Error,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Provider health
// ---------------------------------------------------------------------------

/// Health classification of a request-response provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Maintenance,
}

impl HealthStatus {
    /// Sort rank for candidate selection (lower is better).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Healthy => 0,
            Self::Degraded => 1,
            Self::Unhealthy => 2,
            Self::Maintenance => 3,
        }
    }

    /// Whether the router may send traffic to a provider in this state.
    pub fn is_routable(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
            Self::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Routed operations
// ---------------------------------------------------------------------------

/// Logical request-response operations routed across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Quote,
    MultipleQuotes,
    Historical,
    OptionChain,
    MarketStatus,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Quote => "quote",
            Self::MultipleQuotes => "multiple_quotes",
            Self::Historical => "historical",
            Self::OptionChain => "option_chain",
            Self::MarketStatus => "market_status",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Rate-limit windows
// ---------------------------------------------------------------------------

/// Quota window that refused a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Second,
    Minute,
    Daily,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Daily => "daily",
        };
        f.write_str(s)
    }
}
