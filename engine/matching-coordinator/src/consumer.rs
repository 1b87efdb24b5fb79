//! Queue consumer loop
//!
//! Takes one event at a time and processes it to completion before reading the next.
//! Receipt is acknowledgement: a failed event is logged and never requeued.

use crate::coordinator::MatchingCoordinator;
use match_queue::{CandidateQueue, QueueError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub struct MatchingConsumer {
    coordinator: Arc<MatchingCoordinator>,
    queue: Arc<dyn CandidateQueue>,
}

impl MatchingConsumer {
    pub fn new(coordinator: Arc<MatchingCoordinator>, queue: Arc<dyn CandidateQueue>) -> Self {
        Self { coordinator, queue }
    }

    pub fn coordinator(&self) -> &Arc<MatchingCoordinator> {
        &self.coordinator
    }

    /// Consume until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let idle_poll = self.coordinator.config().idle_poll();
        let retry_delay = self.coordinator.config().queue_retry_delay();
        info!("Matching consumer listening on '{}'", self.queue.name());

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                next = self.queue.next(idle_poll) => next,
                _ = shutdown.changed() => break,
            };

            match next {
                Ok(Some(event)) => {
                    // Errors are already logged and counted by the coordinator
                    let _ = self.coordinator.process_event(&event).await;
                }
                Ok(None) => {}
                Err(e @ QueueError::Decode { .. }) => warn!("{}", e),
                Err(QueueError::Closed) => {
                    info!("Candidate queue closed");
                    break;
                }
                Err(e) => {
                    error!("Candidate queue read failed, retrying in {:?}: {}", retry_delay, e);
                    tokio::select! {
                        _ = tokio::time::sleep(retry_delay) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        let stats = self.coordinator.stats();
        info!(
            processed = stats.processed,
            matched = stats.matched,
            partial = stats.partial,
            "Matching consumer stopped"
        );
    }

    /// Process every event currently queued, without waiting for new ones
    pub async fn process_pending(&self) -> usize {
        let mut processed = 0;
        loop {
            match self.queue.next(Duration::ZERO).await {
                Ok(Some(event)) => {
                    let _ = self.coordinator.process_event(&event).await;
                    processed += 1;
                }
                Ok(None) | Err(QueueError::Closed) => break,
                Err(e @ QueueError::Decode { .. }) => warn!("{}", e),
                Err(e) => {
                    error!("Candidate queue read failed: {}", e);
                    break;
                }
            }
        }
        processed
    }
}
