//! Driver aggregate storage

mod memory;
mod redis_store;

pub use self::memory::InMemoryDriverStore;
pub use self::redis_store::RedisDriverStore;

use crate::driver::{DriverRoute, PushOutcome};
use crate::error::{DriverStoreError, Result, RouteError};
use rideshare_types::{Coordinate, DriverId, StationId};
use tracing::debug;

/// Attempts made by read-modify-write helpers before giving up on a conflict
const MAX_CONFLICT_RETRIES: usize = 3;

/// Storage contract for driver aggregates.
///
/// `save` is optimistic: it succeeds only when the stored version still equals the
/// version the caller loaded, and returns the new version.
#[async_trait::async_trait]
pub trait DriverStore: Send + Sync {
    /// Insert a new driver
    async fn register(&self, driver: DriverRoute) -> Result<DriverId>;

    async fn load(&self, driver_id: DriverId) -> Result<DriverRoute>;

    /// Simulating drivers ordered by id
    async fn list_active(&self) -> Result<Vec<DriverRoute>>;

    async fn save(&self, driver: &DriverRoute) -> Result<u64>;

    async fn delete(&self, driver_id: DriverId) -> Result<()>;

    async fn start_simulation(&self, driver_id: DriverId) -> Result<()> {
        modify_driver(self, driver_id, |driver| {
            driver.start_simulation();
            Ok(())
        })
        .await
    }

    async fn stop_simulation(&self, driver_id: DriverId) -> Result<()> {
        modify_driver(self, driver_id, |driver| {
            driver.stop_simulation();
            Ok(())
        })
        .await
    }

    /// Apply a matched station to the stored driver
    async fn push_front(
        &self,
        driver_id: DriverId,
        station_id: StationId,
        location: Coordinate,
    ) -> Result<PushOutcome> {
        modify_driver(self, driver_id, |driver| driver.push_front(station_id, location)).await
    }
}

/// Load, mutate and save a driver, retrying on version conflicts.
///
/// The mutation runs again against the freshly loaded copy on every attempt.
pub async fn modify_driver<S, T, F>(store: &S, driver_id: DriverId, mut mutate: F) -> Result<T>
where
    S: DriverStore + ?Sized,
    F: FnMut(&mut DriverRoute) -> std::result::Result<T, RouteError> + Send,
    T: Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut driver = store.load(driver_id).await?;
        let value = mutate(&mut driver)?;
        match store.save(&driver).await {
            Ok(_) => return Ok(value),
            Err(e) if e.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                debug!(driver_id = %driver_id, attempt, "Driver write conflict, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn conflict(driver: &DriverRoute) -> DriverStoreError {
    DriverStoreError::Conflict { driver_id: driver.driver_id(), expected: driver.version() }
}
