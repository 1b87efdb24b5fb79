//! Error types for the candidate queue

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue connection failed: {0}")]
    Connection(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode candidate event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Dropped malformed candidate payload {payload:?}: {source}")]
    Decode {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Queue is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
