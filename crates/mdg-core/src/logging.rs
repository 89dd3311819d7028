//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on; a daily-rotating file is added when a log
//! directory is configured. `RUST_LOG` overrides the level passed in.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Line format for every installed layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored on the console.
    #[default]
    Text,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Call once at program start.
///
/// # Parameters
///
/// - `log_level`: default level if `RUST_LOG` is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: log file prefix (e.g. `"mdg-runner"`)
/// - `format`: text or JSON lines
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = match format {
        LogFormat::Text => fmt::layer().with_target(true).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
    };

    let file_layer = log_dir.map(|dir| {
        let file_appender = tracing_appender::rolling::daily(dir, module_name);
        match format {
            LogFormat::Text => fmt::layer().with_writer(file_appender).with_ansi(false).with_target(true).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(file_appender).with_target(true).boxed(),
        }
    });

    tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
}
