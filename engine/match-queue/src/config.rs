//! Configuration for the candidate queue

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Name of the list holding candidate events
    pub queue_name: String,

    /// Fixed delay between connection attempts in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            queue_name: "matching_queue".to_string(),
            reconnect_delay_ms: 5000,
        }
    }
}

impl QueueConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
