//! Combined health/usage reports and operator recommendations.

use mdg_core::types::HealthStatus;
use serde::Serialize;
use serde_json::Value;

use crate::health::{HealthMonitor, HealthSummary};
use crate::rate_limiter::{RateLimiter, UsageEntry, UsageStats};

const GLOBAL_PRESSURE_PCT: f64 = 80.0;
const DAILY_PRESSURE_PCT: f64 = 90.0;

/// Gateway health report: provider health, quota usage, realtime stats.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayReport {
    pub health: HealthSummary,
    pub usage: UsageStats,
    pub websockets: Value,
}

/// Usage report with generated recommendations.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub usage: UsageStats,
    pub health: HealthSummary,
    pub recommendations: Vec<String>,
}

pub fn gateway_report(health: &HealthMonitor, limiter: &RateLimiter, websockets: Value) -> GatewayReport {
    GatewayReport { health: health.get_health_summary(), usage: limiter.usage_stats(), websockets }
}

pub fn usage_report(health: &HealthMonitor, limiter: &RateLimiter) -> UsageReport {
    let usage = limiter.usage_stats();
    let health = health.get_health_summary();
    let recommendations = recommendations(&usage, &health);
    UsageReport { usage, health, recommendations }
}

fn pressured(entry: &UsageEntry, threshold: f64) -> bool {
    entry.limit.is_some() && entry.percentage > threshold
}

pub fn recommendations(usage: &UsageStats, health: &HealthSummary) -> Vec<String> {
    let mut out = Vec::new();

    for (window, entry) in [("minute", &usage.global.minute), ("daily", &usage.global.daily)] {
        if pressured(entry, GLOBAL_PRESSURE_PCT) {
            out.push(format!("enable more providers: global {window} usage is at {:.0}%", entry.percentage));
        }
    }

    for (name, counter) in &usage.providers {
        if pressured(&counter.daily, DAILY_PRESSURE_PCT) {
            out.push(format!("{name} is close to its daily limit ({:.0}%)", counter.daily.percentage));
        }
    }

    for (name, h) in &health.providers {
        match h.status {
            HealthStatus::Unhealthy => out.push(format!("{name} is unhealthy")),
            HealthStatus::Degraded => out.push(format!("{name} is degraded")),
            HealthStatus::Healthy | HealthStatus::Maintenance => {}
        }
    }

    if health.healthy_count == 0 {
        out.push("no healthy providers".to_string());
    }
    out
}
