use super::{conflict, DriverStore};
use crate::driver::DriverRoute;
use crate::error::{DriverStoreError, Result};
use parking_lot::Mutex;
use rideshare_types::DriverId;
use std::collections::BTreeMap;

/// Process-local driver store
#[derive(Debug, Default)]
pub struct InMemoryDriverStore {
    drivers: Mutex<BTreeMap<DriverId, DriverRoute>>,
}

impl InMemoryDriverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.drivers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.lock().is_empty()
    }

    pub fn contains(&self, driver_id: DriverId) -> bool {
        self.drivers.lock().contains_key(&driver_id)
    }
}

#[async_trait::async_trait]
impl DriverStore for InMemoryDriverStore {
    async fn register(&self, mut driver: DriverRoute) -> Result<DriverId> {
        let mut drivers = self.drivers.lock();
        let id = driver.driver_id();
        if drivers.contains_key(&id) {
            return Err(DriverStoreError::AlreadyExists(id));
        }
        driver.set_version(0);
        drivers.insert(id, driver);
        Ok(id)
    }

    async fn load(&self, driver_id: DriverId) -> Result<DriverRoute> {
        self.drivers.lock().get(&driver_id).cloned().ok_or(DriverStoreError::NotFound(driver_id))
    }

    async fn list_active(&self) -> Result<Vec<DriverRoute>> {
        Ok(self.drivers.lock().values().filter(|d| d.is_simulating()).cloned().collect())
    }

    async fn save(&self, driver: &DriverRoute) -> Result<u64> {
        let mut drivers = self.drivers.lock();
        let stored = drivers
            .get_mut(&driver.driver_id())
            .ok_or(DriverStoreError::NotFound(driver.driver_id()))?;
        if stored.version() != driver.version() {
            return Err(conflict(driver));
        }
        let mut next = driver.clone();
        next.set_version(driver.version() + 1);
        *stored = next;
        Ok(driver.version() + 1)
    }

    async fn delete(&self, driver_id: DriverId) -> Result<()> {
        self.drivers.lock().remove(&driver_id).map(|_| ()).ok_or(DriverStoreError::NotFound(driver_id))
    }
}
