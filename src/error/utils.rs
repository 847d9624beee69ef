use super::ProbeError;
use tracing::{error, warn};

/// Logs an error with appropriate severity based on the error type.
///
/// # Arguments
/// * `error` - The ProbeError to log
/// * `context` - Additional context about where/how the error occurred
pub fn log_error(error: &ProbeError, context: &str) {
    match error {
        ProbeError::HttpError { status, message } => {
            if status.is_server_error() {
                error!("{} - HTTP error {}: {}", context, status, message);
            } else {
                warn!("{} - HTTP error {}: {}", context, status, message);
            }
        }
        ProbeError::NetworkError(msg) => {
            warn!("{} - Network error: {}", context, msg);
        }
        ProbeError::Rpc(msg) => {
            warn!("{} - RPC error: {}", context, msg);
        }
        ProbeError::TransactionError { kind, message } => {
            error!("{} - Transaction error: {} - {}", context, kind, message);
        }
        ProbeError::Upload { bucket, key, message } => {
            error!(bucket = %bucket, key = %key, "{} - Upload failed: {}", context, message);
        }
        ProbeError::ConfigError(msg) => {
            error!("{} - Configuration error: {}", context, msg);
        }
        ProbeError::InternalError(msg) => {
            error!("{} - Internal error: {}", context, msg);
        }
        _ => error!("{} - Unexpected error: {}", context, error),
    }
}

/// Converts a reqwest error to a ProbeError with additional context.
///
/// # Arguments
/// * `error` - The reqwest error to convert
/// * `context` - Additional context about the request that failed
pub fn handle_reqwest_error(error: reqwest::Error, context: &str) -> ProbeError {
    if error.is_timeout() {
        ProbeError::NetworkError(format!("{}: Request timed out - {}", context, error))
    } else if let Some(status) = error.status() {
        ProbeError::HttpError {
            status,
            message: format!("{}: {}", context, error),
        }
    } else {
        ProbeError::NetworkError(format!("{}: {}", context, error))
    }
}

/// Wraps an alloy transport failure into a ProbeError.
pub fn handle_rpc_error<E: std::fmt::Display>(error: E, context: &str) -> ProbeError {
    ProbeError::Rpc(format!("{}: {}", context, error))
}
