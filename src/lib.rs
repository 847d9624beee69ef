// Public modules that are part of the API
pub mod chain;
pub mod config;
pub mod error;
pub mod monitoring;
pub mod probe;
pub mod sink;

// Re-export common types
pub use chain::{ChainClient, KlaytnClient, SignedTransfer, Submission, TransferRequest};

pub use probe::{
    BalanceAlert,
    BalanceOutcome,
    CycleReport,
    CycleRunner,
    MeasurementParams,
    MeasurementTask,
    Scheduler,
    SchedulerCommand,
    SubmissionOutcome,
};

pub use sink::{BlobUploader, ParquetRecordSink, RecordSink, S3Uploader};

pub use monitoring::{AlertNotifier, SlackNotifier};

pub use txlatency_types::{MeasurementRecord, RecordError};

pub use error::{
    Result,
    ProbeError,
};
