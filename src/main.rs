use std::sync::Arc;

use chrono::Utc;
use tokio::signal;
use tracing::{error, info, warn};

use txlatency::config::{Profile, ProfileSource, Settings};
use txlatency::error::Result;
use txlatency::monitoring::{init_logging, init_metrics, SlackNotifier};
use txlatency::{KlaytnClient, MeasurementParams, MeasurementTask, ParquetRecordSink, S3Uploader, Scheduler, SchedulerCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Configuration is read exactly once; nothing below touches the process environment.
    let profile = Profile::from_env();
    let (settings, source) = Settings::load(".", &profile)?;

    let console_level = std::env::var("RUST_LOG").unwrap_or_else(|_| settings.log_level.clone());
    let _guard = init_logging(&settings.log_dir, "debug", &console_level)?;

    match &source {
        ProfileSource::File(path) => info!(profile = %profile, "using {}", path.display()),
        ProfileSource::Missing(path) => warn!(
            profile = %profile,
            path = %path.display(),
            "Profile file not found, using environment only"
        ),
    }
    info!(rpc_url = %settings.rpc_url, bucket = %settings.s3_bucket, "Configuration loaded successfully");

    if let Some(addr) = settings.metrics_listen_addr.as_deref() {
        init_metrics(addr)?;
    }

    info!("Initializing components...");
    let chain = Arc::new(KlaytnClient::connect(
        &settings.rpc_url,
        &settings.private_key,
        settings.request_timeout(),
    )?);

    let uploader = S3Uploader::from_env(settings.s3_bucket.clone(), settings.s3_key_prefix.clone()).await;
    let sink = Arc::new(ParquetRecordSink::new(
        uploader,
        settings.spool_dir.clone(),
        settings.retain_failed_uploads,
    )?);

    let notifier = Arc::new(SlackNotifier::new(
        settings.slack_api_url.clone(),
        settings.slack_channel.clone(),
        settings.slack_auth.clone(),
        settings.request_timeout(),
    )?);

    let task = Arc::new(MeasurementTask::new(
        chain,
        sink,
        notifier,
        MeasurementParams::from_settings(&settings)?,
    ));

    let (scheduler, cmd_tx) = Scheduler::new(task, settings.interval())?;

    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received. Sending shutdown signal to scheduler...");
        if cmd_tx.send(SchedulerCommand::Shutdown).await.is_err() {
            error!("Failed to send shutdown command to scheduler.");
        }
    });

    info!(
        start_time = Utc::now().timestamp_millis(),
        interval_ms = settings.interval_ms,
        "starting tx latency measurement..."
    );

    let launched = scheduler.start().await;

    info!(launched, "txlatency shutting down...");
    Ok(())
}
