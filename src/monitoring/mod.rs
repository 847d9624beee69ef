use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use std::net::SocketAddr;
use std::path::Path;
use crate::error::{Result, ProbeError};
use tracing::info;

mod notifier;

pub use notifier::{AlertNotifier, SlackNotifier};

pub const LOG_FILE_NAME: &str = "txlatency.log";

pub const METRIC_CYCLES: &str = "txlatency_cycles_total";
pub const METRIC_SUBMIT_FAILURES: &str = "txlatency_submit_failures_total";
pub const METRIC_UPLOAD_FAILURES: &str = "txlatency_upload_failures_total";
pub const METRIC_LOW_BALANCE_ALERTS: &str = "txlatency_low_balance_alerts_total";
pub const METRIC_SUBMIT_DURATION: &str = "txlatency_submit_duration_ms";

/// Initializes the logging system (both console and file).
/// Returns a guard that must be kept alive for file logging to work.
pub fn init_logging(log_dir: &str, file_level: &str, console_level: &str) -> Result<WorkerGuard> {
    let log_path = Path::new(log_dir);
    if !log_path.exists() {
        std::fs::create_dir_all(log_path)?;
    }

    // --- File Logger ---
    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::try_new(file_level)
        .map_err(|e| ProbeError::ConfigError(format!("Invalid file log level filter '{}': {}", file_level, e)))?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .with_filter(file_filter);

    // --- Console Logger ---
    let console_filter = EnvFilter::try_new(console_level)
        .map_err(|e| ProbeError::ConfigError(format!("Invalid console log level filter '{}': {}", console_level, e)))?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ProbeError::InternalError(format!("Failed to initialize tracing subscriber: {}", e)))?;

    Ok(guard)
}

/// Installs the Prometheus exporter on `listen_addr`. Without it the metric
/// macros are no-ops.
pub fn init_metrics(listen_addr: &str) -> Result<()> {
    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|e| ProbeError::ConfigError(format!("Invalid metrics address '{}': {}", listen_addr, e)))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ProbeError::InternalError(format!("Failed to install Prometheus exporter: {}", e)))?;

    info!(%addr, "Prometheus exporter listening");
    Ok(())
}
