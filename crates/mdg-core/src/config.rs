//! Configuration parsing for the gateway.
//!
//! One JSON file describes the realtime connections to supervise, the
//! request-response providers with their quotas, the global quota, and the
//! health/routing tunables.
//!
//! # Example config
//!
//! ```json
//! {
//!   "gateway": { "module_name": "mdg", "log_path": "/tmp/log" },
//!   "connections": [{
//!     "id": "c1", "provider": "upstox", "url": "wss://api.upstox.com/v2/feed",
//!     "heartbeat_interval_ms": 30000,
//!     "subscriptions": [{ "symbol": "RELIANCE", "type": "quotes" }]
//!   }],
//!   "providers": [{ "name": "upstox", "capabilities": ["quote"], "requests_per_minute": 250 }],
//!   "global_limits": { "requests_per_minute": 1000 }
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{GatewayError, Result};
use crate::types::{Operation, Provider, SubscriptionKey};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Module metadata (name, log path).
    #[serde(default)]
    pub gateway: Option<ModuleMeta>,

    /// Realtime connections to open at startup.
    #[serde(default)]
    pub connections: Vec<ConnectionSettings>,

    /// Request-response providers available to the router.
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,

    /// Aggregate quota across all providers.
    #[serde(default)]
    pub global_limits: LimitSettings,

    #[serde(default)]
    pub health: HealthSettings,

    #[serde(default)]
    pub routing: RoutingSettings,
}

impl GatewayConfig {
    /// Returns the module name, defaulting to `"mdg"`.
    pub fn module_name(&self) -> String {
        self.gateway.as_ref().and_then(|m| m.module_name.clone()).unwrap_or_else(|| "mdg".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.gateway.as_ref().and_then(|m| m.log_path.clone())
    }

    /// Validate every section. Duplicate connection ids and provider names are rejected.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for conn in &self.connections {
            conn.validate()?;
            if !seen.insert(conn.id.as_str()) {
                return Err(GatewayError::Config(format!("duplicate connection id '{}'", conn.id)));
            }
        }
        let mut names = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(GatewayError::Config("provider name must not be empty".into()));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(GatewayError::Config(format!("duplicate provider '{}'", provider.name)));
            }
        }
        Ok(())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// One supervised realtime connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Unique connection id (e.g. `"upstox-nse"`).
    pub id: String,

    /// Protocol family of the provider.
    pub provider: Provider,

    /// Full WebSocket URL.
    pub url: String,

    /// Extra HTTP headers for the handshake (e.g. bearer credentials).
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Opaque authentication frame sent right after the socket opens.
    #[serde(default)]
    pub auth_payload: Option<serde_json::Value>,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Base delay of the exponential reconnect backoff.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Optional silence watchdog. `None` disables it.
    #[serde(default)]
    pub heartbeat_timeout_ms: Option<u64>,

    /// Subscriptions to establish once the connection is up.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionKey>,
}

impl ConnectionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(GatewayError::Config("connection id must not be empty".into()));
        }
        if self.heartbeat_interval_ms == 0 || self.reconnect_interval_ms == 0 {
            return Err(GatewayError::Config(format!("connection '{}': intervals must be non-zero", self.id)));
        }
        if self.heartbeat_timeout_ms == Some(0) {
            return Err(GatewayError::Config(format!("connection '{}': heartbeat timeout must be non-zero", self.id)));
        }
        url::Url::parse(&self.url)
            .map_err(|e| GatewayError::Config(format!("connection '{}': invalid url '{}': {e}", self.id, self.url)))?;
        Ok(())
    }
}

/// A request-response provider known to the router.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub name: String,

    /// Operations this provider can serve.
    #[serde(default)]
    pub capabilities: Vec<Operation>,

    #[serde(flatten)]
    pub limits: LimitSettings,

    /// Lightweight endpoint used by active health probes.
    #[serde(default)]
    pub health_url: Option<String>,
}

/// Request quotas. `None` means unlimited for that window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LimitSettings {
    #[serde(default)]
    pub requests_per_second: Option<u32>,
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
}

/// Health monitor tunables.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthSettings {
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Length of the rolling sample window.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
    /// Consecutive failures tolerated before a provider is forced unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_degraded_latency_ms")]
    pub degraded_latency_ms: u64,
    #[serde(default = "default_degraded_uptime_pct")]
    pub degraded_uptime_pct: f64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            window_ms: default_window_ms(),
            max_samples: default_max_samples(),
            failure_threshold: default_failure_threshold(),
            degraded_latency_ms: default_degraded_latency_ms(),
            degraded_uptime_pct: default_degraded_uptime_pct(),
        }
    }
}

/// Router defaults applied when a request does not override them.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoutingSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self { timeout_ms: default_timeout_ms(), retry_count: default_retry_count(), batch_size: default_batch_size() }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}
fn default_reconnect_interval_ms() -> u64 {
    5_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_probe_interval_ms() -> u64 {
    60_000
}
fn default_probe_timeout_ms() -> u64 {
    5_000
}
fn default_window_ms() -> u64 {
    5 * 60_000
}
fn default_max_samples() -> usize {
    100
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_degraded_latency_ms() -> u64 {
    2_000
}
fn default_degraded_uptime_pct() -> f64 {
    90.0
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retry_count() -> u32 {
    2
}
fn default_batch_size() -> usize {
    50
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<GatewayConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: GatewayConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
