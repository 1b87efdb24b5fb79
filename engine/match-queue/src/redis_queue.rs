//! Redis list backed candidate queue
//!
//! Events are appended with `RPUSH` and taken with `BLPOP`. Redis persistence makes
//! the list survive broker restarts; the pop is the acknowledgement.

use crate::config::QueueConfig;
use crate::error::{QueueError, Result};
use crate::CandidateQueue;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use rideshare_types::CandidateEvent;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RedisCandidateQueue {
    connection_manager: ConnectionManager,
    queue_name: String,
}

impl RedisCandidateQueue {
    /// Connect once
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let client = Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        info!("Connected to candidate queue '{}'", config.queue_name);
        Ok(Self { connection_manager, queue_name: config.queue_name.clone() })
    }

    /// Connect, retrying forever with the configured fixed delay
    pub async fn connect_with_retry(config: &QueueConfig) -> Self {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match Self::connect(config).await {
                Ok(queue) => return queue,
                Err(e) => {
                    warn!(
                        attempt,
                        "Candidate queue unavailable ({}), retrying in {}ms",
                        e,
                        config.reconnect_delay_ms
                    );
                    tokio::time::sleep(config.reconnect_delay()).await;
                }
            }
        }
    }

    pub async fn len(&self) -> Result<usize> {
        let mut conn = self.connection_manager.clone();
        Ok(conn.llen(&self.queue_name).await?)
    }
}

#[async_trait::async_trait]
impl CandidateQueue for RedisCandidateQueue {
    async fn publish(&self, event: &CandidateEvent) -> Result<()> {
        let payload = event.encode().map_err(QueueError::Encode)?;
        let mut conn = self.connection_manager.clone();
        conn.rpush::<_, _, ()>(&self.queue_name, payload).await?;
        Ok(())
    }

    async fn next(&self, wait: Duration) -> Result<Option<CandidateEvent>> {
        let mut conn = self.connection_manager.clone();
        let payload: Option<String> = if wait.is_zero() {
            redis::cmd("LPOP").arg(&self.queue_name).query_async(&mut conn).await?
        } else {
            let popped: Option<(String, String)> = redis::cmd("BLPOP")
                .arg(&self.queue_name)
                .arg(blpop_timeout_secs(wait))
                .query_async(&mut conn)
                .await?;
            popped.map(|(_, payload)| payload)
        };

        payload.map(decode_payload).transpose()
    }

    fn name(&self) -> &str {
        &self.queue_name
    }
}

/// BLPOP takes whole seconds and treats zero as "block forever"
fn blpop_timeout_secs(wait: Duration) -> u64 {
    wait.as_secs_f64().ceil().max(1.0) as u64
}

/// Decode a popped payload; the payload is kept on failure for the log line
fn decode_payload(payload: String) -> Result<CandidateEvent> {
    CandidateEvent::decode(&payload).map_err(|source| QueueError::Decode { payload, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_types::{DriverId, StationId, UserId};

    fn event() -> CandidateEvent {
        CandidateEvent {
            driver_id: DriverId(4),
            user_id: UserId(40),
            nearby_station_id: StationId(2),
            nearby_station_name: "Depot".into(),
            current_lat: 0.0,
            current_lng: 0.0009,
            timestamp: "10:01".parse().unwrap(),
            free_seats: 2,
            destination_lat: 0.0,
            destination_lng: 0.005,
        }
    }

    #[test]
    fn blpop_wait_rounds_up_to_whole_seconds() {
        assert_eq!(blpop_timeout_secs(Duration::from_millis(1)), 1);
        assert_eq!(blpop_timeout_secs(Duration::from_millis(1000)), 1);
        assert_eq!(blpop_timeout_secs(Duration::from_millis(1500)), 2);
    }

    #[test]
    fn malformed_payload_is_reported_with_its_contents() {
        let decoded = decode_payload(event().encode().unwrap()).unwrap();
        assert_eq!(decoded, event());

        match decode_payload("{\"driver_id\": 1".to_string()) {
            Err(QueueError::Decode { payload, .. }) => assert_eq!(payload, "{\"driver_id\": 1"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    /// Runs against a local Redis: `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn list_round_trip_against_redis() {
        let config = QueueConfig {
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            queue_name: format!("matching_queue_test_{}", std::process::id()),
            ..Default::default()
        };
        let queue = RedisCandidateQueue::connect(&config).await.unwrap();

        queue.publish(&event()).await.unwrap();
        let mut conn = queue.connection_manager.clone();
        conn.rpush::<_, _, ()>(&config.queue_name, "not json").await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        assert_eq!(queue.next(Duration::from_secs(1)).await.unwrap(), Some(event()));
        assert!(matches!(queue.next(Duration::ZERO).await, Err(QueueError::Decode { .. })));
        assert_eq!(queue.next(Duration::ZERO).await.unwrap(), None);
    }
}
