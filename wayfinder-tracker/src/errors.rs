//! Tracker error types
//!
//! Only lifecycle and configuration problems surface as errors. Everything
//! that can go wrong *during* tracking (refused scans, missing models, failed
//! predictions, log I/O) is logged and absorbed.

use thiserror::Error;
use wayfinder_core::CoreError;

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracker is already running")]
    AlreadyRunning,

    #[error("Tracker is not running")]
    NotRunning,
}
