//! Error types for driver routes and driver storage

use rideshare_types::{Coordinate, DriverId, StationId};
use thiserror::Error;

/// Errors raised by the route state machine itself
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Driver {driver_id} has an empty route")]
    EmptyRoute { driver_id: DriverId },

    #[error("Driver {driver_id} route contains invalid waypoint {location}")]
    InvalidWaypoint { driver_id: DriverId, location: Coordinate },

    #[error("Driver {driver_id} is not simulating")]
    NotSimulating { driver_id: DriverId },

    #[error("Driver {driver_id} is waiting at station {current}, cannot push station {requested}")]
    AlreadyMatched { driver_id: DriverId, current: StationId, requested: StationId },

    #[error("Station {station_id} has invalid location {location}")]
    InvalidStation { station_id: StationId, location: Coordinate },
}

/// Errors raised by a `DriverStore`
#[derive(Error, Debug)]
pub enum DriverStoreError {
    #[error("Driver {0} not found")]
    NotFound(DriverId),

    #[error("Driver {0} already exists")]
    AlreadyExists(DriverId),

    #[error("Driver {driver_id} was modified concurrently (expected version {expected})")]
    Conflict { driver_id: DriverId, expected: u64 },

    #[error("Unexpected store reply {reply} for driver {driver_id}")]
    UnexpectedReply { driver_id: DriverId, reply: i64 },

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DriverStoreError {
    /// Whether the operation can succeed if retried against fresh state
    pub fn is_conflict(&self) -> bool {
        matches!(self, DriverStoreError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, DriverStoreError>;
