//! Candidate publisher used by the simulation clock

use crate::error::Result;
use crate::CandidateQueue;
use rideshare_types::CandidateEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Publish counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub published: u64,
    pub failed: u64,
}

/// Wraps a queue with logging and accounting. Failures are returned to the caller and
/// never retried here.
pub struct CandidatePublisher {
    queue: Arc<dyn CandidateQueue>,
    published: AtomicU64,
    failed: AtomicU64,
}

impl CandidatePublisher {
    pub fn new(queue: Arc<dyn CandidateQueue>) -> Self {
        Self { queue, published: AtomicU64::new(0), failed: AtomicU64::new(0) }
    }

    pub fn queue(&self) -> &Arc<dyn CandidateQueue> {
        &self.queue
    }

    pub async fn publish(&self, event: &CandidateEvent) -> Result<()> {
        match self.queue.publish(event).await {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                info!(
                    driver_id = %event.driver_id,
                    station_id = %event.nearby_station_id,
                    sim_time = %event.timestamp,
                    "Published candidate to '{}'",
                    self.queue.name()
                );
                Ok(())
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    driver_id = %event.driver_id,
                    station_id = %event.nearby_station_id,
                    "Failed to publish candidate: {}",
                    e
                );
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
