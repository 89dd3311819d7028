//! Active health probes.
//!
//! A [`HealthProbe`] checks one provider; [`spawn_probe_loop`] runs a set of
//! probes on a fixed interval and feeds the results into a
//! [`HealthMonitor`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::health::{HealthMonitor, ProbeResult};

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Provider this probe reports for.
    fn provider(&self) -> &str;

    async fn probe(&self) -> ProbeResult;
}

/// `GET` against a lightweight provider endpoint. Any 2xx counts as up.
pub struct HttpProbe {
    provider: String,
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpProbe {
    pub fn new(provider: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self { provider: provider.into(), url: url.into(), timeout, http: reqwest::Client::new() }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn probe(&self) -> ProbeResult {
        let start = Instant::now();
        let resp = self.http.get(&self.url).timeout(self.timeout).send().await;
        let elapsed = start.elapsed().as_millis() as u64;

        match resp {
            Ok(r) if r.status().is_success() => ProbeResult::ok(elapsed, Some(r.status().as_u16())),
            Ok(r) => {
                let status = r.status();
                ProbeResult::failed(elapsed, Some(status.as_u16()), format!("HTTP {status}"))
            }
            Err(e) if e.is_timeout() => ProbeResult::failed(elapsed, None, "probe timed out"),
            Err(e) => ProbeResult::failed(elapsed, None, e.to_string()),
        }
    }
}

/// Run every probe once per `interval`, first tick immediately.
pub fn spawn_probe_loop(
    monitor: Arc<HealthMonitor>,
    probes: Vec<Arc<dyn HealthProbe>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for probe in &probes {
                let result = probe.probe().await;
                if result.success {
                    debug!("[health] probe '{}' ok in {}ms", probe.provider(), result.response_time_ms);
                } else {
                    warn!(
                        "[health] probe '{}' failed: {}",
                        probe.provider(),
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                monitor.record_probe(probe.provider(), result);
            }
        }
    })
}
