//! Fixed-window request quotas, per provider and in aggregate.
//!
//! Three buckets are tracked for every counter: one second, one minute and
//! one day. A bucket is anchored at its first reservation and cleared once
//! its span has elapsed. A reservation must fit every configured bucket of
//! both the provider and the global counter, otherwise nothing is counted.
//!
//! All state sits behind one mutex, so check-and-increment is atomic across
//! tasks.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use mdg_core::config::LimitSettings;
use mdg_core::error::{GatewayError, Result};
use mdg_core::types::WindowKind;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Quota configuration. `None` leaves a window unlimited.
pub type LimitConfig = LimitSettings;

/// Name reported when the aggregate quota refuses a request.
pub const GLOBAL: &str = "global";

const KINDS: [WindowKind; 3] = [WindowKind::Second, WindowKind::Minute, WindowKind::Daily];

fn span(kind: WindowKind) -> Duration {
    match kind {
        WindowKind::Second => Duration::from_secs(1),
        WindowKind::Minute => Duration::from_secs(60),
        WindowKind::Daily => Duration::from_secs(24 * 60 * 60),
    }
}

fn limit_for(limits: &LimitConfig, kind: WindowKind) -> Option<u32> {
    match kind {
        WindowKind::Second => limits.requests_per_second,
        WindowKind::Minute => limits.requests_per_minute,
        WindowKind::Daily => limits.daily_limit,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    used: u32,
    started: Option<Instant>,
}

impl Bucket {
    fn roll(&mut self, kind: WindowKind, now: Instant) {
        if let Some(start) = self.started {
            if now.duration_since(start) >= span(kind) {
                self.used = 0;
                self.started = None;
            }
        }
    }

    fn reset_in_ms(&self, kind: WindowKind, now: Instant) -> u64 {
        let left = match self.started {
            Some(start) => span(kind).saturating_sub(now.duration_since(start)),
            None => span(kind),
        };
        left.as_millis() as u64
    }
}

#[derive(Debug, Clone)]
struct Counter {
    limits: LimitConfig,
    buckets: [Bucket; 3],
}

impl Counter {
    fn new(limits: LimitConfig) -> Self {
        Self { limits, buckets: [Bucket::default(); 3] }
    }

    fn roll(&mut self, now: Instant) {
        for (bucket, kind) in self.buckets.iter_mut().zip(KINDS) {
            bucket.roll(kind, now);
        }
    }

    /// First window that cannot take `cost` more, with time until it resets.
    fn refusal(&self, cost: u32, now: Instant) -> Option<(WindowKind, u64)> {
        self.buckets.iter().zip(KINDS).find_map(|(bucket, kind)| {
            let limit = limit_for(&self.limits, kind)?;
            (bucket.used.saturating_add(cost) > limit).then(|| (kind, bucket.reset_in_ms(kind, now)))
        })
    }

    fn add(&mut self, cost: u32, now: Instant) {
        for bucket in &mut self.buckets {
            bucket.started.get_or_insert(now);
            bucket.used = bucket.used.saturating_add(cost);
        }
    }

    fn sub(&mut self, cost: u32) {
        for bucket in &mut self.buckets {
            bucket.used = bucket.used.saturating_sub(cost);
        }
    }

    fn usage(&self) -> CounterUsage {
        let entry = |i: usize| {
            let kind = KINDS[i];
            UsageEntry::new(self.buckets[i].used, limit_for(&self.limits, kind))
        };
        CounterUsage { second: entry(0), minute: entry(1), daily: entry(2) }
    }
}

/// Usage of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsageEntry {
    pub used: u32,
    pub limit: Option<u32>,
    /// `used / limit * 100`; zero for unlimited windows.
    pub percentage: f64,
}

impl UsageEntry {
    fn new(used: u32, limit: Option<u32>) -> Self {
        let percentage = match limit {
            Some(l) if l > 0 => used as f64 / l as f64 * 100.0,
            Some(_) => 100.0,
            None => 0.0,
        };
        Self { used, limit, percentage }
    }
}

/// Usage of one counter across its windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CounterUsage {
    pub second: UsageEntry,
    pub minute: UsageEntry,
    pub daily: UsageEntry,
}

/// Snapshot returned by [`RateLimiter::usage_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    pub global: CounterUsage,
    pub providers: BTreeMap<String, CounterUsage>,
}

struct State {
    global: Counter,
    providers: AHashMap<String, Counter>,
}

impl State {
    fn roll(&mut self, provider: &str, now: Instant) {
        self.global.roll(now);
        if let Some(c) = self.providers.get_mut(provider) {
            c.roll(now);
        }
    }

    fn refusal(&self, provider: &str, cost: u32, now: Instant) -> Option<GatewayError> {
        let provider_refusal =
            self.providers.get(provider).and_then(|c| c.refusal(cost, now)).map(|r| (provider, r));
        let (name, (window, reset_in_ms)) =
            provider_refusal.or_else(|| self.global.refusal(cost, now).map(|r| (GLOBAL, r)))?;
        Some(GatewayError::RateLimitExceeded { provider: name.to_string(), window, reset_in_ms })
    }
}

/// Per-provider plus global fixed-window rate limiter.
pub struct RateLimiter {
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(global: LimitConfig) -> Self {
        Self { state: Mutex::new(State { global: Counter::new(global), providers: AHashMap::new() }) }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("[limiter] state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Set the quota for `provider`. Usage already counted is kept.
    pub fn configure(&self, provider: &str, limits: LimitConfig) {
        let mut state = self.lock_state();
        state.providers.entry(provider.to_string()).and_modify(|c| c.limits = limits).or_insert_with(|| Counter::new(limits));
        debug!("[limiter] configured '{provider}': {limits:?}");
    }

    /// Whether a reservation of `cost` would currently succeed. Counts nothing.
    pub fn check(&self, provider: &str, cost: u32) -> Result<()> {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.roll(provider, now);
        match state.refusal(provider, cost, now) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Count `cost` requests against `provider` and the global quota, or
    /// fail without counting anything.
    pub fn reserve(&self, provider: &str, cost: u32) -> Result<()> {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.roll(provider, now);
        if let Some(err) = state.refusal(provider, cost, now) {
            debug!("[limiter] refused '{provider}': {err}");
            return Err(err);
        }
        state.global.add(cost, now);
        state
            .providers
            .entry(provider.to_string())
            .or_insert_with(|| Counter::new(LimitConfig::default()))
            .add(cost, now);
        Ok(())
    }

    /// Credit back `cost` requests that never reached the provider.
    /// Counters never go below zero.
    pub fn release(&self, provider: &str, cost: u32) {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.roll(provider, now);
        state.global.sub(cost);
        if let Some(c) = state.providers.get_mut(provider) {
            c.sub(cost);
        }
    }

    pub fn usage_stats(&self) -> UsageStats {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.global.roll(now);
        for c in state.providers.values_mut() {
            c.roll(now);
        }
        UsageStats {
            global: state.global.usage(),
            providers: state.providers.iter().map(|(name, c)| (name.clone(), c.usage())).collect(),
        }
    }

    /// Clear every window of `provider`.
    pub fn reset(&self, provider: &str) {
        if let Some(c) = self.lock_state().providers.get_mut(provider) {
            c.buckets = [Bucket::default(); 3];
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
