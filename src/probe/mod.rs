//! One latency measurement cycle and the scheduler that fires them.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use txlatency_types::MeasurementRecord;

use crate::chain::units::{format_amount, BalanceUnit};
use crate::chain::{ChainClient, TransferRequest};
use crate::config::Settings;
use crate::error::{log_error, ProbeError, Result};
use crate::monitoring::{
    AlertNotifier, METRIC_CYCLES, METRIC_LOW_BALANCE_ALERTS, METRIC_SUBMIT_DURATION,
    METRIC_SUBMIT_FAILURES, METRIC_UPLOAD_FAILURES,
};
use crate::sink::RecordSink;

mod scheduler;

pub use scheduler::{CycleRunner, Scheduler, SchedulerCommand};

/// Per-cycle parameters, fixed at startup.
#[derive(Debug, Clone)]
pub struct MeasurementParams {
    pub gas_limit: u64,
    /// Alert threshold in peb.
    pub alert_threshold: U256,
    pub alert_unit: BalanceUnit,
    pub explorer_url: String,
    pub serialize_submissions: bool,
    /// Upper bound on waiting for the submission lock, on signing and on the send.
    pub submit_timeout: Duration,
}

impl MeasurementParams {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            gas_limit: settings.gas_limit,
            alert_threshold: settings.alert_threshold()?,
            alert_unit: settings.balance_alert_unit,
            explorer_url: settings.explorer_url.clone(),
            serialize_submissions: settings.serialize_submissions,
            submit_timeout: settings.request_timeout(),
        })
    }
}

/// Low-balance warning for one account. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceAlert {
    pub address: Address,
    pub balance: U256,
    pub threshold: U256,
    pub unit: BalanceUnit,
}

impl BalanceAlert {
    /// Slack mrkdwn text linking the account page on the block explorer.
    pub fn message(&self, explorer_url: &str) -> String {
        format!(
            "Current balance of <{}/account/{}|{}> is less than {} {}! balance={}",
            explorer_url.trim_end_matches('/'),
            self.address,
            self.address,
            format_amount(self.threshold, self.unit),
            self.unit,
            format_amount(self.balance, self.unit),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceOutcome {
    Sufficient(U256),
    Alerted(BalanceAlert),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Persisted { record: MeasurementRecord, key: String },
    UploadFailed { record: MeasurementRecord, error: String },
    SubmitFailed(String),
}

impl SubmissionOutcome {
    pub fn record(&self) -> Option<&MeasurementRecord> {
        match self {
            SubmissionOutcome::Persisted { record, .. } | SubmissionOutcome::UploadFailed { record, .. } => {
                Some(record)
            }
            SubmissionOutcome::SubmitFailed(_) => None,
        }
    }
}

/// What happened in one cycle. Both halves run independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub balance: BalanceOutcome,
    pub submission: SubmissionOutcome,
}

/// Orchestrates a measurement: balance check, zero-value self-transfer, timing,
/// record hand-off.
///
/// Shared by every cycle through an `Arc`. The only mutable piece is the
/// submission lock, which keeps overlapping cycles from signing with the same
/// nonce. The lock covers nonce fetch, signing and the send; the timed window
/// covers the send alone. Each step is bounded by `submit_timeout`, so a stalled
/// node call releases the lock instead of parking every later cycle.
pub struct MeasurementTask {
    chain: Arc<dyn ChainClient>,
    sink: Arc<dyn RecordSink>,
    notifier: Arc<dyn AlertNotifier>,
    params: MeasurementParams,
    submit_lock: Mutex<()>,
}

impl MeasurementTask {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        sink: Arc<dyn RecordSink>,
        notifier: Arc<dyn AlertNotifier>,
        params: MeasurementParams,
    ) -> Self {
        Self {
            chain,
            sink,
            notifier,
            params,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &MeasurementParams {
        &self.params
    }

    /// Runs one full cycle. Never fails: every error is logged and folded into the report.
    pub async fn measure(&self, cycle: u64) -> CycleReport {
        metrics::increment_counter!(METRIC_CYCLES);

        let (balance, submission) = tokio::join!(self.check_balance(), self.submit_and_persist());

        CycleReport {
            cycle,
            balance,
            submission,
        }
    }

    /// Reads the balance fresh and fires an alert when it is under the threshold.
    pub async fn check_balance(&self) -> BalanceOutcome {
        let address = self.chain.address();
        let balance = match self.chain.get_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                log_error(&e, "Balance check skipped");
                return BalanceOutcome::Failed(e.to_string());
            }
        };

        if balance >= self.params.alert_threshold {
            debug!(%address, %balance, "Balance above alert threshold");
            return BalanceOutcome::Sufficient(balance);
        }

        let alert = BalanceAlert {
            address,
            balance,
            threshold: self.params.alert_threshold,
            unit: self.params.alert_unit,
        };
        warn!(
            %address,
            balance = %format_amount(balance, alert.unit),
            threshold = %format_amount(alert.threshold, alert.unit),
            unit = %alert.unit,
            "Balance below alert threshold"
        );
        metrics::increment_counter!(METRIC_LOW_BALANCE_ALERTS);
        self.notifier.notify(alert.message(&self.params.explorer_url));
        BalanceOutcome::Alerted(alert)
    }

    async fn submit_and_persist(&self) -> SubmissionOutcome {
        let record = match self.submit_timed().await {
            Ok(record) => record,
            Err(e) => {
                metrics::increment_counter!(METRIC_SUBMIT_FAILURES);
                log_error(&e, "Transaction submission failed, no record this cycle");
                return SubmissionOutcome::SubmitFailed(e.to_string());
            }
        };

        info!(
            chain_id = record.chain_id(),
            tx_hash = %record.tx_hash(),
            duration_ms = record.duration_ms(),
            "{}",
            record.csv_line()
        );
        metrics::histogram!(METRIC_SUBMIT_DURATION, record.duration_ms() as f64);

        match self.sink.persist(&record).await {
            Ok(key) => SubmissionOutcome::Persisted { record, key },
            Err(e) => {
                metrics::increment_counter!(METRIC_UPLOAD_FAILURES);
                log_error(&e, "Record persistence failed, record dropped");
                SubmissionOutcome::UploadFailed {
                    record,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Signs and sends the self-transfer, timing only the send call.
    pub async fn submit_timed(&self) -> Result<MeasurementRecord> {
        let request = TransferRequest::self_transfer(self.chain.address(), self.params.gas_limit);

        let limit = self.params.submit_timeout;
        let guard = if self.params.serialize_submissions {
            let guard = tokio::time::timeout(limit, self.submit_lock.lock())
                .await
                .map_err(|_| stalled("Previous submission still holds the account lock", limit))?;
            Some(guard)
        } else {
            None
        };

        let signed = tokio::time::timeout(limit, self.chain.sign(&request))
            .await
            .map_err(|_| stalled("Signing", limit))??;

        let start = Utc::now();
        let started = Instant::now();
        let submission = tokio::time::timeout(limit, self.chain.submit(&signed))
            .await
            .map_err(|_| stalled("eth_sendRawTransaction", limit))??;
        let elapsed = started.elapsed();
        drop(guard);

        let end = start
            + chrono::Duration::from_std(elapsed)
                .map_err(|e| ProbeError::InternalError(format!("Elapsed time out of range: {}", e)))?;

        let chain_id = self.chain.decode_chain_id(&signed)?;
        Ok(MeasurementRecord::new(
            chain_id,
            submission.tx_hash.to_string(),
            start,
            end,
        )?)
    }
}

fn stalled(step: &str, limit: Duration) -> ProbeError {
    ProbeError::NetworkError(format!("{} did not complete within {:?}", step, limit))
}

#[async_trait]
impl CycleRunner for MeasurementTask {
    async fn run_cycle(&self, cycle: u64) {
        let report = self.measure(cycle).await;
        debug!(?report, "Cycle finished");
    }
}
