//! Scenario files for standalone runs
//!
//! A scenario is a JSON document listing stations, drivers and ride requests. It is
//! loaded into the in-memory collaborators and driver store before the first tick.

use anyhow::{Context, Result};
use driver_route::{DriverRoute, DriverStore, RouteQueue};
use rideshare_types::{Coordinate, DriverId, NewRideRequest, SimTime, Station, StationId, UserId};
use serde::{Deserialize, Serialize};
use service_clients::{InMemoryCollaborators, RiderDemand};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub stations: Vec<Station>,

    #[serde(default)]
    pub drivers: Vec<ScenarioDriver>,

    #[serde(default)]
    pub ride_requests: Vec<NewRideRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDriver {
    pub driver_id: DriverId,
    pub user_id: UserId,
    pub route: Vec<Coordinate>,

    #[serde(default = "default_free_seats")]
    pub free_seats: u32,

    #[serde(default)]
    pub start_time: SimTime,

    /// Start the driver's simulation right away
    #[serde(default = "default_true")]
    pub simulating: bool,
}

fn default_free_seats() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

/// Counts of seeded entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub stations: usize,
    pub drivers: usize,
    pub ride_requests: usize,
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read scenario {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse scenario {:?}", path))
    }

    /// Small built-in scenario: one driver passes a station where a rider is waiting
    pub fn demo() -> Self {
        let route = (0..=10).map(|i| Coordinate::new(0.0, i as f64 * 0.0003)).collect();
        Self {
            stations: vec![
                Station { id: StationId(1), name: "Market Street".into(), location: Coordinate::new(0.0, 0.0015) },
                Station { id: StationId(2), name: "Harbour".into(), location: Coordinate::new(0.05, 0.05) },
            ],
            drivers: vec![ScenarioDriver {
                driver_id: DriverId(1),
                user_id: UserId(1001),
                route,
                free_seats: default_free_seats(),
                start_time: SimTime::default(),
                simulating: true,
            }],
            ride_requests: vec![NewRideRequest {
                rider_id: UserId(2001),
                station_id: StationId(1),
                eta: SimTime::default().saturating_add(4),
                destination: Coordinate::new(0.0, 0.003),
            }],
        }
    }

    /// Load the scenario into the in-memory world and driver store
    pub async fn seed(&self, world: &InMemoryCollaborators, store: &dyn DriverStore) -> Result<SeedSummary> {
        for station in &self.stations {
            world.add_station(station.clone());
        }

        for spec in &self.drivers {
            let driver = DriverRoute::new(
                spec.driver_id,
                spec.user_id,
                RouteQueue::from(spec.route.clone()),
                spec.free_seats,
                spec.start_time,
            )
            .with_context(|| format!("Invalid route for driver {}", spec.driver_id))?;
            store.register(driver).await.with_context(|| format!("Failed to register driver {}", spec.driver_id))?;
            world.register_driver_user(spec.driver_id, spec.user_id);
            if spec.simulating {
                store.start_simulation(spec.driver_id).await?;
            }
        }

        for request in &self.ride_requests {
            world
                .create_ride_request(request.clone())
                .await
                .with_context(|| format!("Failed to create ride request for rider {}", request.rider_id))?;
        }

        let summary = SeedSummary {
            stations: self.stations.len(),
            drivers: self.drivers.len(),
            ride_requests: self.ride_requests.len(),
        };
        info!(
            stations = summary.stations,
            drivers = summary.drivers,
            ride_requests = summary.ride_requests,
            "Scenario seeded"
        );
        Ok(summary)
    }
}
