use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("negative timestamp: {0}")]
    NegativeTimestamp(i64),

    #[error("end time {end_ms} precedes start time {start_ms}")]
    EndBeforeStart { start_ms: i64, end_ms: i64 },

    #[error("duration {duration_ms} does not match end - start ({expected_ms})")]
    DurationMismatch { duration_ms: i64, expected_ms: i64 },
}

/// One latency measurement: a submitted self-transfer and the time the
/// network took to acknowledge it.
///
/// Fields are private so a record can only be built through [`MeasurementRecord::new`]
/// or [`MeasurementRecord::from_parts`], both of which enforce
/// `duration_ms == end_ms - start_ms` with non-negative timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementRecord {
    chain_id: u64,
    tx_hash: String,
    start_ms: i64,
    end_ms: i64,
    duration_ms: i64,
}

impl MeasurementRecord {
    /// Builds a record from the instants taken around the raw send call.
    pub fn new(
        chain_id: u64,
        tx_hash: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, RecordError> {
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();
        Self::from_parts(chain_id, tx_hash, start_ms, end_ms, end_ms - start_ms)
    }

    /// Rebuilds a record from stored columns, rejecting rows that break the
    /// timing invariant.
    pub fn from_parts(
        chain_id: u64,
        tx_hash: impl Into<String>,
        start_ms: i64,
        end_ms: i64,
        duration_ms: i64,
    ) -> Result<Self, RecordError> {
        if start_ms < 0 {
            return Err(RecordError::NegativeTimestamp(start_ms));
        }
        if end_ms < 0 {
            return Err(RecordError::NegativeTimestamp(end_ms));
        }
        if end_ms < start_ms {
            return Err(RecordError::EndBeforeStart { start_ms, end_ms });
        }
        if duration_ms != end_ms - start_ms {
            return Err(RecordError::DurationMismatch {
                duration_ms,
                expected_ms: end_ms - start_ms,
            });
        }

        Ok(Self {
            chain_id,
            tx_hash: tx_hash.into(),
            start_ms,
            end_ms,
            duration_ms,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.start_ms).single()
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.end_ms).single()
    }

    /// `chainId,txhash,startTime,endTime,duration`, the line logged per submission.
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.chain_id, self.tx_hash, self.start_ms, self.end_ms, self.duration_ms
        )
    }
}
