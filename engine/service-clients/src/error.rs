//! Error types for collaborator calls

use driver_route::DriverStoreError;
use rideshare_types::{TripId, TripStatus};
use thiserror::Error;

/// Result of every remote collaborator call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Trip {trip_id} cannot {action} from {from}")]
    InvalidTransition { trip_id: TripId, from: TripStatus, action: &'static str },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ClientError::NotFound { entity, id: id.to_string() }
    }

    /// Unreachable or slow collaborator, as opposed to a definite answer
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else if e.is_timeout() {
            ClientError::Timeout {
                operation: e.url().map(|u| u.path().to_string()).unwrap_or_else(|| "request".into()),
                timeout_ms: 0,
            }
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<DriverStoreError> for ClientError {
    fn from(e: DriverStoreError) -> Self {
        match e {
            DriverStoreError::NotFound(id) => ClientError::not_found("driver", id),
            DriverStoreError::Redis(e) => ClientError::Transport(e.to_string()),
            DriverStoreError::Serialization(e) => ClientError::Decode(e.to_string()),
            other => ClientError::Rejected(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
