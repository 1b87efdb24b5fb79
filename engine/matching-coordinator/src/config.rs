//! Configuration for the matching coordinator

use rideshare_types::ELIGIBILITY_WINDOW_MINUTES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Riders whose ETA is at most this many minutes past the driver's time are eligible
    pub eligibility_window_minutes: u32,

    /// Timeout for each collaborator call in milliseconds
    pub remote_timeout_ms: u64,

    /// How long one queue read blocks before checking for shutdown
    pub idle_poll_ms: u64,

    /// Delay after a queue error before reading again
    pub queue_retry_delay_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            eligibility_window_minutes: ELIGIBILITY_WINDOW_MINUTES,
            remote_timeout_ms: 3000,
            idle_poll_ms: 1000,
            queue_retry_delay_ms: 5000,
        }
    }
}

impl CoordinatorConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn queue_retry_delay(&self) -> Duration {
        Duration::from_millis(self.queue_retry_delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.remote_timeout_ms == 0 {
            return Err("remote_timeout_ms must be greater than 0".to_string());
        }
        if self.eligibility_window_minutes >= 24 * 60 {
            return Err("eligibility_window_minutes must be less than a day".to_string());
        }
        Ok(())
    }
}
