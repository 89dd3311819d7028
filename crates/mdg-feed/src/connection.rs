//! Per-connection configuration and state snapshots.

use std::time::Duration;

use mdg_core::config::ConnectionSettings;
use mdg_core::error::{GatewayError, Result};
use mdg_core::types::{ConnectionStatus, Provider, SubscriptionKey};
use mdg_core::ws::Endpoint;
use serde::Serialize;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// How to open and keep alive one realtime connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub provider: Provider,
    pub endpoint: Endpoint,
    /// Sent verbatim as the first text frame of every session.
    pub auth_payload: Option<String>,
    pub heartbeat_interval: Duration,
    /// Base delay; attempt `n` (0-based) waits `reconnect_interval * 2^n`.
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    /// Close and reconnect when nothing is received for this long.
    pub heartbeat_timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Config with default timings and no extra headers.
    pub fn new(provider: Provider, url: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: Endpoint { url: url.into(), headers: Default::default() },
            auth_payload: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            heartbeat_timeout: None,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        let auth_payload = match &settings.auth_payload {
            None => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(v) => Some(
                serde_json::to_string(v).map_err(|e| GatewayError::Config(format!("auth payload for '{}': {e}", settings.id)))?,
            ),
        };
        Ok(Self {
            provider: settings.provider,
            endpoint: Endpoint { url: settings.url.clone(), headers: settings.headers.clone() },
            auth_payload,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            reconnect_interval: Duration::from_millis(settings.reconnect_interval_ms),
            max_reconnect_attempts: settings.max_reconnect_attempts,
            heartbeat_timeout: settings.heartbeat_timeout_ms.map(Duration::from_millis),
        })
    }
}

/// Delay before reconnect attempt `count` (0-based).
pub fn backoff_delay(base: Duration, count: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(count))
}

/// Point-in-time view of a supervised connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSnapshot {
    pub id: String,
    pub provider: Provider,
    pub url: String,
    pub status: ConnectionStatus,
    /// Recorded subscriptions, in the order they were first made.
    pub subscriptions: Vec<SubscriptionKey>,
    /// Reconnect attempts since the last successful open.
    pub reconnect_count: u32,
    pub heartbeat_interval_ms: u64,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Epoch millis of the last heartbeat acknowledgement, if any.
    pub last_heartbeat_at: Option<u64>,
}
