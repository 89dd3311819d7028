//! # mdg-runner
//!
//! Entry point for the market-data gateway.
//!
//! Loads a JSON configuration file, opens one supervised WebSocket per
//! configured connection, subscribes the configured symbols, probes REST
//! provider health, and logs feed events plus a periodic gateway report.
//!
//! # Usage
//!
//! ```bash
//! mdg-runner config/gateway.example.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use mdg_core::logging::LogFormat;
use mdg_core::ws::TungsteniteConnector;
use mdg_feed::registry::AdapterRegistry;
use mdg_feed::supervisor::apply_subscriptions;
use mdg_feed::{ConnectionConfig, ConnectionSupervisor, FeedEvent, FeedEventReceiver};
use mdg_route::diagnostics::gateway_report;
use mdg_route::probe::{HealthProbe, HttpProbe, spawn_probe_loop};
use mdg_route::{HealthMonitor, RateLimiter};
use tracing::{debug, error, info, warn};

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Market Data Gateway Runner.
#[derive(Parser)]
#[command(name = "mdg-runner", about = "Multi-provider realtime market data gateway")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `gateway.log_path`.
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit JSON log lines instead of text.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config may name a log directory, so read it before logging is up.
    let config = mdg_core::config::load_config(&cli.config)?;
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    let format = if cli.log_json { LogFormat::Json } else { LogFormat::Text };
    mdg_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name(), format);

    info!(
        "mdg-runner starting: config={}, {} connection(s), {} provider(s)",
        cli.config.display(),
        config.connections.len(),
        config.providers.len()
    );

    // 1. REST-side health and quota tracking
    let health = Arc::new(HealthMonitor::new(config.health.clone()));
    let limiter = Arc::new(RateLimiter::new(config.global_limits));
    let mut probes: Vec<Arc<dyn HealthProbe>> = Vec::new();
    let probe_timeout = Duration::from_millis(config.health.probe_timeout_ms);

    for provider in &config.providers {
        health.register_provider(&provider.name, &provider.capabilities);
        limiter.configure(&provider.name, provider.limits);
        if let Some(url) = &provider.health_url {
            probes.push(Arc::new(HttpProbe::new(&provider.name, url, probe_timeout)));
        }
    }

    let probe_task = (!probes.is_empty()).then(|| {
        info!("starting {} health probe(s) every {}ms", probes.len(), config.health.probe_interval_ms);
        spawn_probe_loop(health.clone(), probes, Duration::from_millis(config.health.probe_interval_ms))
    });

    // 2. Realtime connections
    let (supervisor, events) =
        ConnectionSupervisor::new(Arc::new(TungsteniteConnector::new()), AdapterRegistry::with_defaults());
    let event_task = tokio::spawn(log_events(events));

    for (idx, settings) in config.connections.iter().enumerate() {
        let conn_config = match ConnectionConfig::from_settings(settings) {
            Ok(c) => c,
            Err(e) => {
                error!("connection[{idx}] '{}': invalid settings: {e}", settings.id);
                continue;
            }
        };
        match supervisor.create_connection(&settings.id, conn_config).await {
            Ok(snapshot) => {
                let added = apply_subscriptions(&supervisor, &settings.id, &settings.subscriptions);
                info!(
                    "connection[{idx}] '{}' ({}) is {:?}, {added} subscription(s)",
                    settings.id, settings.provider, snapshot.status
                );
            }
            Err(e) => error!("connection[{idx}] '{}': {e}", settings.id),
        }
    }

    // 3. Periodic diagnostics
    let report_task = {
        let (health, limiter, supervisor) = (health.clone(), limiter.clone(), supervisor.clone());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REPORT_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let websockets = serde_json::json!({
                    "stats": supervisor.stats(),
                    "connections": supervisor.connections(),
                });
                match serde_json::to_string(&gateway_report(&health, &limiter, websockets)) {
                    Ok(report) => info!("gateway report: {report}"),
                    Err(e) => warn!("could not serialize gateway report: {e}"),
                }
            }
        })
    };

    info!("gateway running, press Ctrl+C to stop");

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    report_task.abort();
    let _ = report_task.await;
    if let Some(task) = probe_task {
        task.abort();
    }
    supervisor.shutdown().await;
    drop(supervisor);
    // Drain whatever the closing connections emitted.
    if tokio::time::timeout(Duration::from_secs(2), event_task).await.is_err() {
        warn!("event logger did not finish draining");
    }

    info!("gateway stopped");
    Ok(())
}

async fn log_events(mut events: FeedEventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::MarketData { id, tick } => debug!("[feed:{id}] {tick}"),
            FeedEvent::HeartbeatAck { .. } | FeedEvent::SubscriptionConfirmed { .. } => {}
            FeedEvent::ReconnectFailed { id, attempts } => {
                error!("[feed:{id}] dropped after {attempts} reconnect attempts")
            }
            FeedEvent::ConnectionError { id, message } => warn!("[feed:{id}] {message}"),
            other => info!("[feed:{}] {other:?}", other.connection_id()),
        }
    }
}
