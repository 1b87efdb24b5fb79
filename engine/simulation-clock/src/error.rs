//! Error types for SimulationClock

use driver_route::DriverStoreError;
use thiserror::Error;

/// Errors that can occur in the SimulationClock
#[derive(Error, Debug)]
pub enum ClockError {
    #[error("Driver store error: {0}")]
    Store(#[from] DriverStoreError),

    #[error("Driver store {operation} timed out after {timeout_ms}ms")]
    StoreTimeout { operation: &'static str, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Clock is already running")]
    ClockAlreadyRunning,
}
