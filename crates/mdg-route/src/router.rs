//! Request routing with health-ranked failover.
//!
//! For each request the router builds a candidate list (preferred or pinned
//! provider first, then the health monitor's ranking), skips candidates
//! that are out of quota, and tries them in order until one succeeds or the
//! attempt budget (`retry_count + 1`) is spent. Every attempt is reported
//! back to the [`HealthMonitor`].
//!
//! A timed-out attempt is cancelled by dropping its future; the router never
//! leaves a provider call running in the background.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mdg_core::config::RoutingSettings;
use mdg_core::error::{AttemptFailure, GatewayError, Result};
use mdg_core::types::{HealthStatus, Operation};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapter::{ProviderAdapter, ProviderError, Request, dispatch};
use crate::health::{HealthMonitor, ProviderHealth};
use crate::rate_limiter::{CounterUsage, GLOBAL, RateLimiter};

/// Per-request overrides of the routing defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Tried first when available, capable and not unhealthy.
    pub preferred_provider: Option<String>,
    /// Only try `preferred_provider`; no failover.
    pub force_provider: bool,
    pub timeout: Option<Duration>,
    pub retry_count: Option<u32>,
}

impl RequestOptions {
    pub fn prefer(provider: impl Into<String>) -> Self {
        Self { preferred_provider: Some(provider.into()), ..Default::default() }
    }

    pub fn force(provider: impl Into<String>) -> Self {
        Self { preferred_provider: Some(provider.into()), force_provider: true, ..Default::default() }
    }
}

/// Successful routed response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedResponse {
    pub data: Value,
    pub provider: String,
    pub response_time_ms: u64,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Outcome of one batch in [`ProviderRouter::quotes_batched`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub symbols: Vec<String>,
    pub provider: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchQuotes {
    pub batches: Vec<BatchResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Provider listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub capabilities: Vec<Operation>,
    pub health: Option<ProviderHealth>,
    pub usage: Option<CounterUsage>,
    pub pinned: bool,
}

pub struct ProviderRouter {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    health: Arc<HealthMonitor>,
    limiter: Arc<RateLimiter>,
    settings: RoutingSettings,
    pinned: Mutex<Option<String>>,
}

impl ProviderRouter {
    pub fn new(health: Arc<HealthMonitor>, limiter: Arc<RateLimiter>, settings: RoutingSettings) -> Self {
        Self { adapters: Vec::new(), health, limiter, settings, pinned: Mutex::new(None) }
    }

    /// Add a provider and register it with the health monitor.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.health.register_provider(adapter.name(), adapter.capabilities());
        self.adapters.retain(|a| a.name() != adapter.name());
        info!("[router] registered '{}' for {:?}", adapter.name(), adapter.capabilities());
        self.adapters.push(adapter);
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn adapter(&self, name: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    fn lock_pinned(&self) -> MutexGuard<'_, Option<String>> {
        self.pinned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one request.
    pub async fn request(&self, request: Request, options: RequestOptions) -> Result<RoutedResponse> {
        let operation = request.operation();
        let timeout = options.timeout.unwrap_or(Duration::from_millis(self.settings.timeout_ms));
        let max_attempts = options.retry_count.unwrap_or(self.settings.retry_count).saturating_add(1);
        let preferred = options.preferred_provider.clone().or_else(|| self.active_override());

        let candidates = if options.force_provider {
            self.forced_candidate(operation, preferred.as_deref())?
        } else {
            self.candidates(operation, preferred.as_deref())?
        };
        debug!("[router] {operation} candidates: {candidates:?}");

        let mut failures = Vec::new();
        let mut attempts = 0u32;
        for name in candidates {
            if attempts >= max_attempts {
                break;
            }
            let Some(adapter) = self.adapter(&name) else { continue };

            // Quota may have been taken by a concurrent request since the
            // candidate list was built. Only a global refusal ends the request.
            match self.limiter.reserve(&name, 1) {
                Ok(()) => {}
                Err(e) if matches!(&e, GatewayError::RateLimitExceeded { provider, .. } if provider == GLOBAL) => {
                    return Err(e);
                }
                Err(e) => {
                    debug!("[router] skipping '{name}': {e}");
                    failures.push(AttemptFailure { provider: name, error: e.to_string() });
                    continue;
                }
            }
            attempts += 1;

            let start = Instant::now();
            let outcome = match tokio::time::timeout(timeout, dispatch(adapter.as_ref(), &request)).await {
                Ok(res) => res,
                Err(_) => Err(ProviderError::Timeout(timeout.as_millis() as u64)),
            };
            let elapsed = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(data) => {
                    self.health.record_outcome(&name, true, elapsed, None);
                    debug!("[router] {operation} served by '{name}' in {elapsed}ms (attempt {attempts})");
                    return Ok(RoutedResponse { data, provider: name, response_time_ms: elapsed, attempts });
                }
                Err(e) => {
                    if e.reached_wire() {
                        self.health.record_outcome(&name, false, elapsed, Some(&e.to_string()));
                    } else {
                        self.limiter.release(&name, 1);
                    }
                    warn!("[router] {operation} via '{name}' failed: {e}");
                    failures.push(AttemptFailure { provider: name, error: e.to_string() });
                }
            }
        }

        warn!("[router] {operation} exhausted after {attempts} attempts");
        Err(GatewayError::AllProvidersExhausted { operation, attempts: failures })
    }

    /// Candidate list for normal routing. Providers refused by the limiter
    /// are skipped; if that leaves nothing, the first refusal is returned.
    fn candidates(&self, operation: Operation, preferred: Option<&str>) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        let mut refusal = None;

        let mut admit = |name: &str, out: &mut Vec<String>| {
            if out.iter().any(|n| n == name) {
                return;
            }
            match self.limiter.check(name, 1) {
                Ok(()) => out.push(name.to_string()),
                Err(e) => {
                    debug!("[router] skipping '{name}': {e}");
                    refusal.get_or_insert(e);
                }
            }
        };

        if let Some(p) = preferred {
            let capable = self.adapter(p).is_some_and(|a| a.supports(operation));
            let routable = self.health.status(p).is_some_and(|s| s.is_routable());
            if capable && routable {
                admit(p, &mut out);
            } else {
                debug!("[router] preferred '{p}' not usable for {operation}");
            }
        }

        for name in self.health.get_ranked_candidates(operation) {
            if self.adapter(&name).is_some() {
                admit(&name, &mut out);
            }
        }

        if out.is_empty() {
            return Err(refusal.unwrap_or(GatewayError::NoProviderAvailable { operation }));
        }
        Ok(out)
    }

    fn forced_candidate(&self, operation: Operation, preferred: Option<&str>) -> Result<Vec<String>> {
        let Some(name) = preferred else {
            return Err(GatewayError::NoProviderAvailable { operation });
        };
        let adapter = self.adapter(name).ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))?;
        if !adapter.supports(operation) {
            return Err(GatewayError::NoProviderAvailable { operation });
        }
        Ok(vec![name.to_string()])
    }

    /// Fetch quotes in batches of `batch_size` (default from settings), one
    /// routed `MultipleQuotes` request per batch.
    pub async fn quotes_batched(
        &self,
        symbols: &[String],
        batch_size: Option<usize>,
        options: RequestOptions,
    ) -> BatchQuotes {
        let size = batch_size.unwrap_or(self.settings.batch_size).max(1);
        let mut batches = Vec::new();

        for chunk in symbols.chunks(size) {
            let request = Request::MultipleQuotes { symbols: chunk.to_vec() };
            let result = match self.request(request, options.clone()).await {
                Ok(resp) => {
                    BatchResult { symbols: chunk.to_vec(), provider: Some(resp.provider), data: Some(resp.data), error: None }
                }
                Err(e) => {
                    warn!("[router] quote batch of {} failed: {e}", chunk.len());
                    BatchResult { symbols: chunk.to_vec(), provider: None, data: None, error: Some(e.to_string()) }
                }
            };
            batches.push(result);
        }

        let succeeded = batches.iter().filter(|b| b.error.is_none()).count();
        BatchQuotes { failed: batches.len() - succeeded, succeeded, batches }
    }

    /// Pin routing to `provider` until cleared. The provider must currently
    /// be healthy.
    pub fn switch_to_provider(&self, provider: &str, reason: &str) -> Result<()> {
        if self.adapter(provider).is_none() {
            return Err(GatewayError::UnknownProvider(provider.to_string()));
        }
        let status = self.health.status(provider).unwrap_or(HealthStatus::Unhealthy);
        if status != HealthStatus::Healthy {
            return Err(GatewayError::ProviderNotHealthy { provider: provider.to_string(), status });
        }
        *self.lock_pinned() = Some(provider.to_string());
        info!("[router] pinned to '{provider}': {reason}");
        Ok(())
    }

    pub fn clear_override(&self) {
        if let Some(prev) = self.lock_pinned().take() {
            info!("[router] override for '{prev}' cleared");
        }
    }

    pub fn active_override(&self) -> Option<String> {
        self.lock_pinned().clone()
    }

    pub fn providers(&self) -> Vec<ProviderInfo> {
        let usage = self.limiter.usage_stats();
        let pinned = self.active_override();
        self.adapters
            .iter()
            .map(|a| ProviderInfo {
                name: a.name().to_string(),
                capabilities: a.capabilities().to_vec(),
                health: self.health.provider_health(a.name()),
                usage: usage.providers.get(a.name()).copied(),
                pinned: pinned.as_deref() == Some(a.name()),
            })
            .collect()
    }
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.adapters.iter().map(|a| a.name()).collect();
        f.debug_struct("ProviderRouter").field("providers", &names).field("settings", &self.settings).finish()
    }
}
