//! Error types for the matching coordinator

use rideshare_types::{DriverId, RideRequestId, SimTime, StationId, UserId};
use service_clients::ClientError;
use std::fmt;
use thiserror::Error;

/// Write that failed after the driver's route was already changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    /// The rider stopped looking between selection and update
    RiderRecheck,
    RiderStatus,
    MatchRecord,
    TripCreation,
}

impl fmt::Display for MatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            MatchStage::RiderRecheck => "rider re-check",
            MatchStage::RiderStatus => "rider status update",
            MatchStage::MatchRecord => "match creation",
            MatchStage::TripCreation => "trip creation",
        };
        f.write_str(stage)
    }
}

/// Everything needed to reconcile a half-applied match
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMatchFailure {
    pub stage: MatchStage,
    pub driver_id: DriverId,
    pub station_id: StationId,
    pub rider_id: UserId,
    pub ride_request_id: RideRequestId,
    pub timestamp: SimTime,
    pub reason: String,
}

impl fmt::Display for PartialMatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after route change (driver {}, station {}, rider {}, ride request {}, time {}): {}",
            self.stage,
            self.driver_id,
            self.station_id,
            self.rider_id,
            self.ride_request_id,
            self.timestamp,
            self.reason
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Match lookup failed: {0}")]
    IdempotencyLookup(#[source] ClientError),

    #[error("Rider lookup failed: {0}")]
    RiderLookup(#[source] ClientError),

    #[error("Station directory unavailable: {0}")]
    StationLookup(#[source] ClientError),

    #[error("Station {station_id} is not in the directory")]
    UnknownStation { station_id: StationId },

    #[error("Route update for driver {driver_id} to station {station_id} failed: {source}")]
    RouteMutation {
        driver_id: DriverId,
        station_id: StationId,
        #[source]
        source: ClientError,
    },

    #[error("Partial match: {0}")]
    PartialMatch(Box<PartialMatchFailure>),
}

impl MatchError {
    /// Whether the event left the driver's route changed
    pub fn is_partial(&self) -> bool {
        matches!(self, MatchError::PartialMatch(_))
    }
}
