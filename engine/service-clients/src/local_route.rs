//! Route commands applied directly to a driver store

use crate::contracts::{RouteAction, RouteCommands, RouteUpdate};
use crate::error::Result;
use driver_route::{DriverStore, PushOutcome};
use rideshare_types::Coordinate;
use std::sync::Arc;

/// Applies `PUSH_FRONT` commands to the store the simulation clock reads from
pub struct LocalRouteCommands {
    store: Arc<dyn DriverStore>,
}

impl LocalRouteCommands {
    pub fn new(store: Arc<dyn DriverStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl RouteCommands for LocalRouteCommands {
    async fn update_driver_route(&self, update: &RouteUpdate) -> Result<PushOutcome> {
        match update.action {
            RouteAction::PushFront => {
                let location = Coordinate::new(update.station_lat, update.station_lng);
                Ok(self.store.push_front(update.driver_id, update.station_id, location).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use driver_route::{DriverRoute, InMemoryDriverStore, RouteQueue};
    use rideshare_types::{DriverId, SimTime, StationId, UserId};

    #[tokio::test]
    async fn push_front_reaches_the_store() {
        let store = Arc::new(InMemoryDriverStore::new());
        let route = RouteQueue::from(vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)]);
        let mut driver = DriverRoute::new(DriverId(1), UserId(5), route, 3, SimTime::default()).unwrap();
        driver.start_simulation();
        store.register(driver).await.unwrap();

        let commands = LocalRouteCommands::new(store.clone());
        let update = RouteUpdate {
            driver_id: DriverId(1),
            station_id: StationId(2),
            station_lat: 0.0,
            station_lng: 0.0004,
            action: RouteAction::PushFront,
        };
        assert_eq!(commands.update_driver_route(&update).await.unwrap(), PushOutcome::Inserted);
        assert_eq!(commands.update_driver_route(&update).await.unwrap(), PushOutcome::AlreadyAtHead);
        assert_eq!(store.load(DriverId(1)).await.unwrap().matched_station_id(), Some(StationId(2)));

        let missing = RouteUpdate { driver_id: DriverId(9), ..update };
        let err = commands.update_driver_route(&missing).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound { entity: "driver", .. }));
    }
}
