use std::time::Duration;

use thiserror::Error;

/// WebSocket-level failures.
///
/// Only `connect` returns these to the caller; failures of a live session are
/// reported through the error/failure callbacks and drive the reconnect policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("WebSocket error: {0}")]
    Socket(String),

    #[error("Failed to parse frame: {0}")]
    Parse(String),

    #[error("Gave up reconnecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Connection attempt cancelled")]
    Cancelled,
}
