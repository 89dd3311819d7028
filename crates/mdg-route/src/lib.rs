//! # mdg-route
//!
//! Request-response routing across market data providers.
//!
//! - [`rate_limiter`] — per-provider and global fixed-window quotas
//! - [`health`] — rolling provider health from probes and live outcomes
//! - [`probe`] — active HTTP health probes and the probe loop
//! - [`adapter`] — the `ProviderAdapter` seam and `Request` model
//! - [`router`] — candidate selection, dispatch, failover
//! - [`diagnostics`] — combined reports and recommendations

pub mod adapter;
pub mod diagnostics;
pub mod health;
pub mod probe;
pub mod rate_limiter;
pub mod router;

pub use adapter::{ProviderAdapter, ProviderError, Request};
pub use health::{HealthMonitor, HealthSummary, ProbeResult, ProviderHealth};
pub use rate_limiter::{LimitConfig, RateLimiter, UsageStats};
pub use router::{ProviderRouter, RequestOptions, RoutedResponse};
