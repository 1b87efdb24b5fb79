//! Operations the simulation core consumes from collaborator services

use crate::error::{ClientError, Result};
use driver_route::PushOutcome;
use rideshare_types::{
    DriverId, MatchId, MatchKey, MatchRecord, MatchStatus, NewRideRequest, NewTrip, Notification,
    RideRequest, RideRequestId, RideStatus, SimTime, Station, StationId, Trip, TripId, UserId,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[async_trait::async_trait]
pub trait StationDirectory: Send + Sync {
    async fn list_stations(&self) -> Result<Vec<Station>>;
}

#[async_trait::async_trait]
pub trait RiderDemand: Send + Sync {
    /// `LOOKING` requests at `station_id` with `eta <= max_eta`, earliest created first
    async fn riders_by_station(&self, station_id: StationId, max_eta: SimTime) -> Result<Vec<RideRequest>>;

    async fn get_ride_request(&self, id: RideRequestId) -> Result<RideRequest>;

    async fn update_ride_status(&self, id: RideRequestId, status: RideStatus) -> Result<RideRequest>;

    async fn create_ride_request(&self, request: NewRideRequest) -> Result<RideRequest>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteAction {
    PushFront,
}

/// Route mutation command sent to the owner of a driver aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub driver_id: DriverId,
    pub station_id: StationId,
    pub station_lat: f64,
    pub station_lng: f64,
    pub action: RouteAction,
}

impl RouteUpdate {
    pub fn push_front(driver_id: DriverId, station: &Station) -> Self {
        Self {
            driver_id,
            station_id: station.id,
            station_lat: station.location.lat,
            station_lng: station.location.lng,
            action: RouteAction::PushFront,
        }
    }
}

#[async_trait::async_trait]
pub trait RouteCommands: Send + Sync {
    async fn update_driver_route(&self, update: &RouteUpdate) -> Result<PushOutcome>;
}

/// Whether `create_match` made a new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCreation {
    Created(MatchId),
    Existing(MatchId),
}

impl MatchCreation {
    pub fn id(&self) -> MatchId {
        match self {
            MatchCreation::Created(id) | MatchCreation::Existing(id) => *id,
        }
    }
}

#[async_trait::async_trait]
pub trait MatchRegistry: Send + Sync {
    /// Create an `ACTIVE` match; a second call with the same key returns the first record
    async fn create_match(
        &self,
        key: MatchKey,
        rider_id: UserId,
        ride_request_id: RideRequestId,
    ) -> Result<MatchCreation>;

    async fn find_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>>;

    async fn set_match_status(&self, id: MatchId, status: MatchStatus) -> Result<()>;
}

/// Trip lifecycle owned by the trip service
#[async_trait::async_trait]
pub trait TripLifecycle: Send + Sync {
    /// Schedule a trip; repeated calls for one match return the same trip
    async fn create_trip(&self, trip: NewTrip) -> Result<TripId>;

    /// `SCHEDULED -> ACTIVE`; a no-op on an `ACTIVE` trip
    async fn start_trip(&self, id: TripId) -> Result<Trip>;

    /// Valid from `SCHEDULED` or `ACTIVE`
    async fn complete_trip(&self, id: TripId) -> Result<Trip>;

    /// Valid from any non-terminal state
    async fn cancel_trip(&self, id: TripId) -> Result<Trip>;

    async fn trips_by_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_notification(&self, notification: &Notification) -> Result<()>;
}

/// Bound a collaborator call; expiry becomes `ClientError::Timeout`
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Fire-and-forget notification; failures are logged and swallowed
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification, timeout: Duration) -> bool {
    match with_timeout("send_notification", timeout, notifier.send_notification(&notification)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                user_id = %notification.user_id,
                kind = ?notification.kind,
                "Notification dropped: {}",
                e
            );
            false
        }
    }
}
