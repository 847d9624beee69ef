//! Durable hand-off of measurement records.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use txlatency_types::MeasurementRecord;

use crate::error::{ProbeError, Result};

pub mod columnar;
mod s3;

pub use columnar::{read_record_file, record_file_name, write_record_file};
pub use s3::S3Uploader;

/// Where a cycle's record goes once the transaction is acknowledged.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persists one record and returns the object key it was stored under.
    /// Makes exactly one delivery attempt.
    async fn persist(&self, record: &MeasurementRecord) -> Result<String>;
}

/// Remote object store that accepts a finished local file.
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Uploads `path` as `name`. Returns the full object key once the store
    /// acknowledged the write.
    async fn upload(&self, name: &str, path: &Path) -> Result<String>;

    /// Human-readable destination, for logs.
    fn destination(&self) -> String;
}

/// Spools each record to a local Parquet file, uploads it, then removes the
/// local copy.
pub struct ParquetRecordSink<U> {
    uploader: U,
    spool_dir: PathBuf,
    retain_failed: bool,
}

impl<U: BlobUploader> ParquetRecordSink<U> {
    pub fn new(uploader: U, spool_dir: impl Into<PathBuf>, retain_failed: bool) -> Result<Self> {
        let spool_dir = spool_dir.into();
        std::fs::create_dir_all(&spool_dir)?;
        info!(
            spool_dir = %spool_dir.display(),
            destination = %uploader.destination(),
            retain_failed,
            "ParquetRecordSink initialized"
        );
        Ok(Self {
            uploader,
            spool_dir,
            retain_failed,
        })
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    fn next_file_name(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        record_file_name(Utc::now(), &suffix[..8])
    }
}

#[async_trait]
impl<U: BlobUploader> RecordSink for ParquetRecordSink<U> {
    async fn persist(&self, record: &MeasurementRecord) -> Result<String> {
        let name = self.next_file_name();
        let path = self.spool_dir.join(&name);

        let write_path = path.clone();
        let owned = record.clone();
        tokio::task::spawn_blocking(move || write_record_file(&write_path, &owned))
            .await
            .map_err(|e| ProbeError::InternalError(format!("Parquet writer task failed: {}", e)))??;
        debug!(path = %path.display(), "Record file written");

        match self.uploader.upload(&name, &path).await {
            Ok(key) => {
                info!(key = %key, destination = %self.uploader.destination(), "Record uploaded");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove uploaded record file");
                }
                Ok(key)
            }
            Err(e) => {
                if self.retain_failed {
                    warn!(path = %path.display(), "Upload failed, keeping local record file");
                } else if let Err(rm) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %rm, "Failed to remove record file after failed upload");
                }
                Err(e)
            }
        }
    }
}
