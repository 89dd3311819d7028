//! Rolling provider health.
//!
//! Two signals feed the monitor: active probes ([`HealthMonitor::record_probe`])
//! and passive outcomes reported by the router after every live request
//! ([`HealthMonitor::record_outcome`]). Samples older than the configured
//! window, or beyond `max_samples`, are discarded.
//!
//! Status derivation, in order:
//!
//! 1. `maintenance` if flagged by an operator
//! 2. `unhealthy` if consecutive failures exceed the threshold
//! 3. `degraded` if uptime is below `degraded_uptime_pct` or the average
//!    latency is above `degraded_latency_ms`
//! 4. `healthy` otherwise, including when there are no samples yet

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use mdg_core::config::HealthSettings;
use mdg_core::error::{GatewayError, Result};
use mdg_core::time_util;
use mdg_core::types::{HealthStatus, Operation};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one active probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub response_time_ms: u64,
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn ok(response_time_ms: u64, http_status: Option<u16>) -> Self {
        Self { success: true, response_time_ms, http_status, error: None }
    }

    pub fn failed(response_time_ms: u64, http_status: Option<u16>, error: impl Into<String>) -> Self {
        Self { success: false, response_time_ms, http_status, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    success: bool,
    latency_ms: u64,
}

#[derive(Debug, Default)]
struct ProviderState {
    capabilities: Vec<Operation>,
    samples: VecDeque<Sample>,
    consecutive_failures: u32,
    maintenance: bool,
    last_checked_ms: Option<u64>,
    last_error: Option<String>,
    last_error_at: Option<u64>,
    last_http_status: Option<u16>,
}

/// Health of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub status: HealthStatus,
    pub capabilities: Vec<Operation>,
    pub uptime_pct: f64,
    pub error_rate_pct: f64,
    pub average_response_time_ms: f64,
    pub consecutive_failures: u32,
    pub samples: usize,
    pub last_checked_ms: Option<u64>,
    pub last_error: Option<String>,
    /// Wall-clock ms of the most recent failed sample.
    pub last_error_at: Option<u64>,
    pub last_http_status: Option<u16>,
}

/// Result of [`HealthMonitor::get_health_summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub providers: BTreeMap<String, ProviderHealth>,
    pub healthy_count: usize,
    pub total_count: usize,
    /// Mean uptime across providers, in percent.
    pub overall_availability: f64,
    /// Mean of the per-provider average latencies of providers with samples.
    pub average_response_time: f64,
}

pub struct HealthMonitor {
    settings: HealthSettings,
    /// Registration order, used as the final ranking tie-break.
    order: Mutex<Vec<String>>,
    state: Mutex<AHashMap<String, ProviderState>>,
}

impl HealthMonitor {
    pub fn new(settings: HealthSettings) -> Self {
        Self { settings, order: Mutex::new(Vec::new()), state: Mutex::new(AHashMap::new()) }
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    fn lock_state(&self) -> MutexGuard<'_, AHashMap<String, ProviderState>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("[health] state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_order(&self) -> MutexGuard<'_, Vec<String>> {
        self.order.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track `name`, replacing its capabilities if already known.
    pub fn register_provider(&self, name: &str, capabilities: &[Operation]) {
        let mut state = self.lock_state();
        let entry = state.entry(name.to_string()).or_insert_with(|| {
            self.lock_order().push(name.to_string());
            ProviderState::default()
        });
        entry.capabilities = capabilities.to_vec();
        debug!("[health] registered '{name}' for {capabilities:?}");
    }

    pub fn set_maintenance(&self, name: &str, maintenance: bool) -> Result<()> {
        let mut state = self.lock_state();
        let entry = state.get_mut(name).ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))?;
        entry.maintenance = maintenance;
        info!("[health] '{name}' maintenance = {maintenance}");
        Ok(())
    }

    pub fn record_probe(&self, name: &str, result: ProbeResult) {
        let mut state = self.lock_state();
        let Some(entry) = state.get_mut(name) else {
            debug!("[health] probe for unregistered provider '{name}' ignored");
            return;
        };
        entry.last_http_status = result.http_status;
        self.push_sample(name, entry, result.success, result.response_time_ms, result.error.as_deref());
    }

    /// Passive update after a live request.
    pub fn record_outcome(&self, name: &str, success: bool, latency_ms: u64, error: Option<&str>) {
        let mut state = self.lock_state();
        let Some(entry) = state.get_mut(name) else {
            debug!("[health] outcome for unregistered provider '{name}' ignored");
            return;
        };
        self.push_sample(name, entry, success, latency_ms, error);
    }

    fn push_sample(&self, name: &str, entry: &mut ProviderState, success: bool, latency_ms: u64, error: Option<&str>) {
        let before = self.derive(entry);
        let now = Instant::now();

        entry.samples.push_back(Sample { at: now, success, latency_ms });
        self.prune(entry, now);
        let checked_at = time_util::now_ms();
        entry.last_checked_ms = Some(checked_at);
        if success {
            entry.consecutive_failures = 0;
        } else {
            entry.consecutive_failures += 1;
            entry.last_error = error.map(str::to_string);
            entry.last_error_at = Some(checked_at);
        }

        let after = self.derive(entry);
        if before != after {
            match after {
                HealthStatus::Healthy => info!("[health] '{name}' {before} -> {after}"),
                _ => warn!("[health] '{name}' {before} -> {after}"),
            }
        }
    }

    fn prune(&self, entry: &mut ProviderState, now: Instant) {
        let window = Duration::from_millis(self.settings.window_ms);
        while entry.samples.front().is_some_and(|s| now.duration_since(s.at) > window) {
            entry.samples.pop_front();
        }
        while entry.samples.len() > self.settings.max_samples.max(1) {
            entry.samples.pop_front();
        }
    }

    /// `(uptime_pct, error_rate_pct, average_response_time_ms)` over the window.
    fn rates(entry: &ProviderState) -> (f64, f64, f64) {
        let total = entry.samples.len();
        if total == 0 {
            return (100.0, 0.0, 0.0);
        }
        let ok = entry.samples.iter().filter(|s| s.success).count();
        let latency: u64 = entry.samples.iter().map(|s| s.latency_ms).sum();
        let uptime = ok as f64 / total as f64 * 100.0;
        (uptime, 100.0 - uptime, latency as f64 / total as f64)
    }

    fn derive(&self, entry: &ProviderState) -> HealthStatus {
        if entry.maintenance {
            return HealthStatus::Maintenance;
        }
        if entry.consecutive_failures > self.settings.failure_threshold {
            return HealthStatus::Unhealthy;
        }
        if entry.samples.is_empty() {
            return HealthStatus::Healthy;
        }
        let (uptime, _, avg) = Self::rates(entry);
        if uptime < self.settings.degraded_uptime_pct || avg > self.settings.degraded_latency_ms as f64 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    fn view(&self, name: &str, entry: &mut ProviderState, now: Instant) -> ProviderHealth {
        self.prune(entry, now);
        let (uptime_pct, error_rate_pct, average_response_time_ms) = Self::rates(entry);
        ProviderHealth {
            name: name.to_string(),
            status: self.derive(entry),
            capabilities: entry.capabilities.clone(),
            uptime_pct,
            error_rate_pct,
            average_response_time_ms,
            consecutive_failures: entry.consecutive_failures,
            samples: entry.samples.len(),
            last_checked_ms: entry.last_checked_ms,
            last_error: entry.last_error.clone(),
            last_error_at: entry.last_error_at,
            last_http_status: entry.last_http_status,
        }
    }

    pub fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.get_mut(name).map(|e| self.view(name, e, now))
    }

    pub fn status(&self, name: &str) -> Option<HealthStatus> {
        self.provider_health(name).map(|h| h.status)
    }

    /// Providers in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.lock_order().clone()
    }

    pub fn get_health_summary(&self) -> HealthSummary {
        let order = self.provider_names();
        let mut state = self.lock_state();
        let now = Instant::now();

        let providers: BTreeMap<String, ProviderHealth> = order
            .iter()
            .filter_map(|name| state.get_mut(name).map(|e| (name.clone(), self.view(name, e, now))))
            .collect();

        let total_count = providers.len();
        let healthy_count = providers.values().filter(|h| h.status == HealthStatus::Healthy).count();
        let overall_availability = if total_count == 0 {
            0.0
        } else {
            providers.values().map(|h| h.uptime_pct).sum::<f64>() / total_count as f64
        };
        let sampled: Vec<f64> =
            providers.values().filter(|h| h.samples > 0).map(|h| h.average_response_time_ms).collect();
        let average_response_time =
            if sampled.is_empty() { 0.0 } else { sampled.iter().sum::<f64>() / sampled.len() as f64 };

        HealthSummary { providers, healthy_count, total_count, overall_availability, average_response_time }
    }

    /// Routable providers capable of `operation`, best first: healthy before
    /// degraded, then higher uptime, then lower average latency.
    pub fn get_ranked_candidates(&self, operation: Operation) -> Vec<String> {
        let order = self.provider_names();
        let mut state = self.lock_state();
        let now = Instant::now();

        let mut ranked: Vec<ProviderHealth> = order
            .iter()
            .filter_map(|name| state.get_mut(name).map(|e| self.view(name, e, now)))
            .filter(|h| h.status.is_routable() && h.capabilities.contains(&operation))
            .collect();

        ranked.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then(b.uptime_pct.total_cmp(&a.uptime_pct))
                .then(a.average_response_time_ms.total_cmp(&b.average_response_time_ms))
        });
        ranked.into_iter().map(|h| h.name).collect()
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor").field("providers", &self.provider_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        let m = HealthMonitor::new(HealthSettings::default());
        m.register_provider("upstox", &[Operation::Quote, Operation::Historical]);
        m.register_provider("flattrade", &[Operation::Quote]);
        m.register_provider("fyers", &[Operation::Quote, Operation::OptionChain]);
        m
    }

    #[test]
    fn fresh_providers_are_healthy() {
        let m = monitor();
        assert_eq!(m.status("upstox"), Some(HealthStatus::Healthy));
        assert_eq!(m.status("zerodha"), None);
        let summary = m.get_health_summary();
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.healthy_count, 3);
        assert_eq!(summary.overall_availability, 100.0);
        assert_eq!(m.provider_health("upstox").unwrap().last_error_at, None);
    }

    #[test]
    fn consecutive_failures_past_threshold_mark_unhealthy() {
        let m = monitor();
        for _ in 0..3 {
            m.record_outcome("upstox", false, 100, Some("HTTP 502"));
        }
        // Threshold is 3; only exceeding it flips the status.
        assert_eq!(m.status("upstox"), Some(HealthStatus::Degraded));
        m.record_outcome("upstox", false, 100, Some("HTTP 502"));
        assert_eq!(m.status("upstox"), Some(HealthStatus::Unhealthy));
        assert!(!m.get_ranked_candidates(Operation::Quote).contains(&"upstox".to_string()));

        m.record_outcome("upstox", true, 100, None);
        let h = m.provider_health("upstox").unwrap();
        assert_eq!(h.consecutive_failures, 0);
        assert_eq!(h.status, HealthStatus::Degraded);
        assert_eq!(h.last_error.as_deref(), Some("HTTP 502"));
        assert!(h.last_error_at.is_some_and(|at| at <= h.last_checked_ms.unwrap()));
        assert!((h.uptime_pct - 20.0).abs() < 1e-9);
        assert!((h.error_rate_pct - 80.0).abs() < 1e-9);
    }

    #[test]
    fn slow_provider_is_degraded() {
        let m = monitor();
        m.record_probe("fyers", ProbeResult::ok(3_500, Some(200)));
        let h = m.provider_health("fyers").unwrap();
        assert_eq!(h.status, HealthStatus::Degraded);
        assert_eq!(h.last_http_status, Some(200));
    }

    #[test]
    fn ranking_orders_by_status_uptime_then_latency() {
        let m = monitor();
        // upstox: healthy, 100% uptime, 400ms
        m.record_probe("upstox", ProbeResult::ok(400, Some(200)));
        // flattrade: healthy, 100% uptime, 150ms
        m.record_probe("flattrade", ProbeResult::ok(150, Some(200)));
        // fyers: degraded (50% uptime), fast
        m.record_probe("fyers", ProbeResult::ok(50, Some(200)));
        m.record_probe("fyers", ProbeResult::failed(50, Some(503), "unavailable"));

        assert_eq!(m.get_ranked_candidates(Operation::Quote), vec!["flattrade", "upstox", "fyers"]);
        assert_eq!(m.get_ranked_candidates(Operation::Historical), vec!["upstox"]);
        assert!(m.get_ranked_candidates(Operation::MarketStatus).is_empty());
    }

    #[test]
    fn maintenance_excludes_provider() {
        let m = monitor();
        m.set_maintenance("flattrade", true).unwrap();
        assert_eq!(m.status("flattrade"), Some(HealthStatus::Maintenance));
        assert_eq!(m.get_ranked_candidates(Operation::Quote), vec!["upstox", "fyers"]);
        assert!(m.set_maintenance("zerodha", true).is_err());
    }

    #[test]
    fn sample_count_is_bounded() {
        let m = HealthMonitor::new(HealthSettings { max_samples: 5, ..Default::default() });
        m.register_provider("p", &[Operation::Quote]);
        for _ in 0..4 {
            m.record_outcome("p", false, 10, Some("boom"));
            m.record_outcome("p", true, 10, None);
        }
        assert_eq!(m.provider_health("p").unwrap().samples, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn old_samples_leave_the_window() {
        let m = HealthMonitor::new(HealthSettings { window_ms: 60_000, ..Default::default() });
        m.register_provider("p", &[Operation::Quote]);
        m.record_outcome("p", false, 10, Some("boom"));
        m.record_outcome("p", true, 10, None);
        assert_eq!(m.status("p"), Some(HealthStatus::Degraded));

        tokio::time::advance(Duration::from_secs(61)).await;
        let h = m.provider_health("p").unwrap();
        assert_eq!(h.samples, 0);
        assert_eq!(h.status, HealthStatus::Healthy);
    }
}
