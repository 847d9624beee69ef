mod record;

pub use record::{MeasurementRecord, RecordError};
