//! Single-row Parquet encoding of [`MeasurementRecord`].
//!
//! Column names and types are the on-disk contract downstream queries rely on:
//! `txhash: UTF8`, `startTime`/`endTime: TIMESTAMP_MILLIS`, `chainId`/`duration: INT64`.

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use txlatency_types::MeasurementRecord;

use crate::error::{ProbeError, Result};

pub const COL_TX_HASH: &str = "txhash";
pub const COL_START_TIME: &str = "startTime";
pub const COL_END_TIME: &str = "endTime";
pub const COL_CHAIN_ID: &str = "chainId";
pub const COL_DURATION: &str = "duration";

pub fn record_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(COL_TX_HASH, DataType::Utf8, false),
        Field::new(COL_START_TIME, DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(COL_END_TIME, DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(COL_CHAIN_ID, DataType::Int64, false),
        Field::new(COL_DURATION, DataType::Int64, false),
    ]))
}

/// `YYYYMMDD_HHMMSS_<suffix>.parquet`. The suffix keeps two records finishing
/// in the same second from overwriting each other in the bucket.
pub fn record_file_name(now: DateTime<Utc>, suffix: &str) -> String {
    format!("{}_{}.parquet", now.format("%Y%m%d_%H%M%S"), suffix)
}

fn record_batch(record: &MeasurementRecord) -> Result<RecordBatch> {
    let chain_id = i64::try_from(record.chain_id()).map_err(|_| {
        ProbeError::InternalError(format!("chain id {} does not fit INT64", record.chain_id()))
    })?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![record.tx_hash()])),
        Arc::new(TimestampMillisecondArray::from(vec![record.start_ms()])),
        Arc::new(TimestampMillisecondArray::from(vec![record.end_ms()])),
        Arc::new(Int64Array::from(vec![chain_id])),
        Arc::new(Int64Array::from(vec![record.duration_ms()])),
    ];

    Ok(RecordBatch::try_new(record_schema(), columns)?)
}

/// Writes `record` as a one-row Parquet file at `path`, replacing any existing file.
pub fn write_record_file(path: &Path, record: &MeasurementRecord) -> Result<()> {
    let batch = record_batch(record)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| ProbeError::InternalError(format!("column '{}' missing or mistyped", name)))
}

/// Reads every row of a record file back into validated records.
pub fn read_record_file(path: &Path) -> Result<Vec<MeasurementRecord>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let tx_hash = column::<StringArray>(&batch, COL_TX_HASH)?;
        let start = column::<TimestampMillisecondArray>(&batch, COL_START_TIME)?;
        let end = column::<TimestampMillisecondArray>(&batch, COL_END_TIME)?;
        let chain_id = column::<Int64Array>(&batch, COL_CHAIN_ID)?;
        let duration = column::<Int64Array>(&batch, COL_DURATION)?;

        for row in 0..batch.num_rows() {
            let chain = u64::try_from(chain_id.value(row)).map_err(|_| {
                ProbeError::InternalError(format!("negative chain id {}", chain_id.value(row)))
            })?;
            records.push(MeasurementRecord::from_parts(
                chain,
                tx_hash.value(row),
                start.value(row),
                end.value(row),
                duration.value(row),
            )?);
        }
    }
    Ok(records)
}
