use thiserror::Error;
use std::fmt;
use reqwest::StatusCode;
use txlatency_types::RecordError;

mod utils;
pub use utils::*;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Chain RPC error: {0}")]
    Rpc(String),

    #[error("Transaction error: {kind} - {message}")]
    TransactionError {
        kind: TransactionErrorKind,
        message: String,
    },

    #[error("Invalid measurement record: {0}")]
    Record(#[from] RecordError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Upload of {key} to bucket {bucket} failed: {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {status} - {message}")]
    HttpError {
        status: StatusCode,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionErrorKind {
    InvalidKey,
    SigningFailed,
    DecodeFailed,
    MissingChainId,
}

impl fmt::Display for TransactionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "Invalid private key"),
            Self::SigningFailed => write!(f, "Signing failed"),
            Self::DecodeFailed => write!(f, "Signed transaction could not be decoded"),
            Self::MissingChainId => write!(f, "Signed transaction carries no chain id"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    pub fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        ProbeError::TransactionError {
            kind,
            message: message.into(),
        }
    }

    pub fn upload(bucket: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        ProbeError::Upload {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}
