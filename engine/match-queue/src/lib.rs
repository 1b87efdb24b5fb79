//! # Match Queue
//!
//! Transport for candidate-match events between the simulation clock and the
//! matching coordinator.
//!
//! - **CandidateQueue**: publish / consume contract, one event per `next` call
//! - **RedisCandidateQueue**: durable Redis list (`RPUSH` / `BLPOP`)
//! - **InMemoryCandidateQueue**: process-local queue for tests and standalone runs
//! - **CandidatePublisher**: logging and accounting wrapper used by the clock
//!
//! Removing an event from the queue acknowledges it. Processing failures after that
//! point are never requeued.

pub mod config;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod redis_queue;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use memory::InMemoryCandidateQueue;
pub use publisher::{CandidatePublisher, PublisherStats};
pub use redis_queue::RedisCandidateQueue;

use rideshare_types::CandidateEvent;
use std::time::Duration;

/// Durable FIFO of candidate events
#[async_trait::async_trait]
pub trait CandidateQueue: Send + Sync {
    async fn publish(&self, event: &CandidateEvent) -> Result<()>;

    /// Wait up to `wait` for the next event. A zero wait polls once.
    ///
    /// Payloads that fail to decode are consumed and reported as `QueueError::Decode`.
    async fn next(&self, wait: Duration) -> Result<Option<CandidateEvent>>;

    fn name(&self) -> &str;
}
