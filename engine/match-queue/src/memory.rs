//! Process-local candidate queue

use crate::error::{QueueError, Result};
use crate::CandidateQueue;
use rideshare_types::CandidateEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// In-memory queue holding encoded payloads, so it round-trips through the wire format
#[derive(Debug)]
pub struct InMemoryCandidateQueue {
    name: String,
    messages: Mutex<VecDeque<String>>,
    available: Notify,
    closed: AtomicBool,
}

impl Default for InMemoryCandidateQueue {
    fn default() -> Self {
        Self::new("matching_queue")
    }
}

impl InMemoryCandidateQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue an already-encoded payload
    pub async fn push_raw(&self, payload: impl Into<String>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        self.messages.lock().await.push_back(payload.into());
        self.available.notify_one();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// Reject further publishes and wake waiting consumers
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_waiters();
    }
}

#[async_trait::async_trait]
impl CandidateQueue for InMemoryCandidateQueue {
    async fn publish(&self, event: &CandidateEvent) -> Result<()> {
        let payload = event.encode().map_err(QueueError::Encode)?;
        self.push_raw(payload).await
    }

    async fn next(&self, wait: Duration) -> Result<Option<CandidateEvent>> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.available.notified();
            if let Some(payload) = self.messages.lock().await.pop_front() {
                return CandidateEvent::decode(&payload)
                    .map(Some)
                    .map_err(|source| QueueError::Decode { payload, source });
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(QueueError::Closed);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_types::{DriverId, StationId, UserId};

    fn event(driver: u64) -> CandidateEvent {
        CandidateEvent {
            driver_id: DriverId(driver),
            user_id: UserId(driver + 100),
            nearby_station_id: StationId(1),
            nearby_station_name: "North".into(),
            current_lat: 0.0,
            current_lng: 0.0,
            timestamp: "10:00".parse().unwrap(),
            free_seats: 2,
            destination_lat: 1.0,
            destination_lng: 1.0,
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = InMemoryCandidateQueue::default();
        tokio_test::assert_ok!(queue.publish(&event(1)).await);
        queue.publish(&event(2)).await.unwrap();
        assert_eq!(queue.len().await, 2);

        let first = queue.next(Duration::ZERO).await.unwrap().unwrap();
        let second = queue.next(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.driver_id, DriverId(1));
        assert_eq!(second.driver_id, DriverId(2));
        assert!(queue.next(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_publish() {
        let queue = std::sync::Arc::new(InMemoryCandidateQueue::default());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.next(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.publish(&event(7)).await.unwrap();

        let received = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(received.driver_id, DriverId(7));
    }

    #[tokio::test]
    async fn times_out_when_empty() {
        let queue = InMemoryCandidateQueue::default();
        let got = queue.next(Duration::from_millis(10)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn malformed_payload_is_consumed_and_reported() {
        let queue = InMemoryCandidateQueue::default();
        queue.push_raw("{not json").await.unwrap();
        queue.publish(&event(3)).await.unwrap();

        assert!(matches!(queue.next(Duration::ZERO).await, Err(QueueError::Decode { .. })));
        let next = queue.next(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(next.driver_id, DriverId(3));
    }

    #[tokio::test]
    async fn closed_queue_rejects_publish() {
        let queue = InMemoryCandidateQueue::default();
        queue.close();
        assert!(matches!(queue.publish(&event(1)).await, Err(QueueError::Closed)));
        assert!(matches!(queue.next(Duration::ZERO).await, Err(QueueError::Closed)));
    }
}
