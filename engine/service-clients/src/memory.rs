//! In-memory collaborator services
//!
//! A single process-local world implementing every collaborator contract with the
//! same rules the remote services apply. Used by standalone mode, the scenario runner
//! and tests. Individual operations can be made to fail with `inject_failure`.

use crate::contracts::{
    MatchCreation, MatchRegistry, Notifier, RiderDemand, StationDirectory, TripLifecycle,
};
use crate::error::{ClientError, Result};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rideshare_types::{
    DriverId, MatchId, MatchKey, MatchRecord, MatchStatus, NewRideRequest, NewTrip, Notification,
    NotificationType, RideRequest, RideRequestId, RideStatus, SimTime, Station, StationId, Trip,
    TripId, TripStatus, UserId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// Operation that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ListStations,
    RidersByStation,
    GetRideRequest,
    UpdateRideStatus,
    CreateMatch,
    FindMatch,
    CreateTrip,
    StartTrip,
    CompleteTrip,
    TripsByDriver,
    SendNotification,
}

#[derive(Debug, Default)]
struct WorldState {
    stations: Vec<Station>,
    rides: BTreeMap<RideRequestId, RideRequest>,
    matches: BTreeMap<MatchId, MatchRecord>,
    trips: BTreeMap<TripId, Trip>,
    trip_by_match: HashMap<MatchId, TripId>,
    driver_users: HashMap<DriverId, UserId>,
    notifications: Vec<Notification>,
    failures: HashSet<FailurePoint>,
    next_ride_id: u64,
    next_match_id: u64,
    next_trip_id: u64,
}

impl WorldState {
    fn check(&self, point: FailurePoint) -> Result<()> {
        if self.failures.contains(&point) {
            Err(ClientError::Transport(format!("injected failure at {:?}", point)))
        } else {
            Ok(())
        }
    }

    fn trip_mut(&mut self, id: TripId) -> Result<&mut Trip> {
        self.trips.get_mut(&id).ok_or_else(|| ClientError::not_found("trip", id))
    }

    fn notify_trip(&mut self, trip: &Trip, kind: NotificationType, message: String) {
        self.notifications.push(Notification::new(trip.rider_id, kind, message.clone()));
        self.notifications.push(Notification::new(trip.driver_user_id, kind, message));
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCollaborators {
    state: Mutex<WorldState>,
    match_index: DashMap<MatchKey, MatchId>,
}

impl InMemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stations(stations: Vec<Station>) -> Self {
        let world = Self::default();
        world.state.lock().stations = stations;
        world
    }

    pub fn add_station(&self, station: Station) {
        self.state.lock().stations.push(station);
    }

    /// Remember which user operates a driver, for driver-side notifications
    pub fn register_driver_user(&self, driver_id: DriverId, user_id: UserId) {
        self.state.lock().driver_users.insert(driver_id, user_id);
    }

    pub fn inject_failure(&self, point: FailurePoint) {
        self.state.lock().failures.insert(point);
    }

    pub fn clear_failure(&self, point: FailurePoint) {
        self.state.lock().failures.remove(&point);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn stations(&self) -> Vec<Station> {
        self.state.lock().stations.clone()
    }

    pub fn ride_requests(&self) -> Vec<RideRequest> {
        self.state.lock().rides.values().cloned().collect()
    }

    pub fn matches(&self) -> Vec<MatchRecord> {
        self.state.lock().matches.values().cloned().collect()
    }

    pub fn trips(&self) -> Vec<Trip> {
        self.state.lock().trips.values().cloned().collect()
    }

    pub fn trip(&self, id: TripId) -> Option<Trip> {
        self.state.lock().trips.get(&id).cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().notifications.clone()
    }

    pub fn notifications_for(&self, user_id: UserId) -> Vec<Notification> {
        self.state.lock().notifications.iter().filter(|n| n.user_id == user_id).cloned().collect()
    }
}

#[async_trait::async_trait]
impl StationDirectory for InMemoryCollaborators {
    async fn list_stations(&self) -> Result<Vec<Station>> {
        let state = self.state.lock();
        state.check(FailurePoint::ListStations)?;
        Ok(state.stations.clone())
    }
}

#[async_trait::async_trait]
impl RiderDemand for InMemoryCollaborators {
    async fn riders_by_station(&self, station_id: StationId, max_eta: SimTime) -> Result<Vec<RideRequest>> {
        let state = self.state.lock();
        state.check(FailurePoint::RidersByStation)?;
        let mut riders: Vec<RideRequest> = state
            .rides
            .values()
            .filter(|r| r.station_id == station_id && r.status == RideStatus::Looking && r.eta <= max_eta)
            .cloned()
            .collect();
        riders.sort_by_key(|r| (r.created_at, r.id));
        Ok(riders)
    }

    async fn get_ride_request(&self, id: RideRequestId) -> Result<RideRequest> {
        let state = self.state.lock();
        state.check(FailurePoint::GetRideRequest)?;
        state.rides.get(&id).cloned().ok_or_else(|| ClientError::not_found("ride request", id))
    }

    async fn update_ride_status(&self, id: RideRequestId, status: RideStatus) -> Result<RideRequest> {
        let mut state = self.state.lock();
        state.check(FailurePoint::UpdateRideStatus)?;
        let ride = state.rides.get_mut(&id).ok_or_else(|| ClientError::not_found("ride request", id))?;
        ride.status = status;
        debug!(ride_request_id = %id, "Ride request status set to {:?}", status);
        Ok(ride.clone())
    }

    async fn create_ride_request(&self, request: NewRideRequest) -> Result<RideRequest> {
        let mut state = self.state.lock();
        if !state.stations.iter().any(|s| s.id == request.station_id) {
            return Err(ClientError::not_found("station", request.station_id));
        }
        state.next_ride_id += 1;
        let ride = RideRequest {
            id: RideRequestId(state.next_ride_id),
            rider_id: request.rider_id,
            station_id: request.station_id,
            eta: request.eta,
            destination: request.destination,
            status: RideStatus::Looking,
            created_at: Utc::now(),
        };
        state.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }
}

#[async_trait::async_trait]
impl MatchRegistry for InMemoryCollaborators {
    async fn create_match(
        &self,
        key: MatchKey,
        rider_id: UserId,
        ride_request_id: RideRequestId,
    ) -> Result<MatchCreation> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CreateMatch)?;
        if let Some(existing) = self.match_index.get(&key) {
            return Ok(MatchCreation::Existing(*existing));
        }
        state.next_match_id += 1;
        let record = MatchRecord {
            id: MatchId(state.next_match_id),
            rider_id,
            driver_id: key.driver_id,
            station_id: key.station_id,
            ride_request_id,
            timestamp: key.timestamp,
            status: MatchStatus::Active,
            created_at: Utc::now(),
        };
        self.match_index.insert(key, record.id);
        info!(match_id = %record.id, "Match created for {}", key);
        let id = record.id;
        state.matches.insert(id, record);
        Ok(MatchCreation::Created(id))
    }

    async fn find_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>> {
        let state = self.state.lock();
        state.check(FailurePoint::FindMatch)?;
        Ok(self.match_index.get(key).and_then(|id| state.matches.get(&*id).cloned()))
    }

    async fn set_match_status(&self, id: MatchId, status: MatchStatus) -> Result<()> {
        let mut state = self.state.lock();
        let record = state.matches.get_mut(&id).ok_or_else(|| ClientError::not_found("match", id))?;
        record.status = status;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TripLifecycle for InMemoryCollaborators {
    async fn create_trip(&self, new_trip: NewTrip) -> Result<TripId> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CreateTrip)?;
        if let Some(existing) = state.trip_by_match.get(&new_trip.match_id) {
            return Ok(*existing);
        }
        state.next_trip_id += 1;
        let trip = Trip {
            id: TripId(state.next_trip_id),
            match_id: new_trip.match_id,
            ride_request_id: new_trip.ride_request_id,
            rider_id: new_trip.rider_id,
            driver_id: new_trip.driver_id,
            driver_user_id: new_trip.driver_user_id,
            pickup_station_id: new_trip.pickup_station_id,
            destination: new_trip.destination,
            status: TripStatus::Scheduled,
            scheduled_at: new_trip.scheduled_at,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        };
        state.trip_by_match.insert(trip.match_id, trip.id);
        state.driver_users.insert(trip.driver_id, trip.driver_user_id);
        state.notify_trip(
            &trip,
            NotificationType::TripScheduled,
            format!("Trip {} scheduled for {}", trip.id, trip.scheduled_at),
        );
        let id = trip.id;
        state.trips.insert(id, trip);
        Ok(id)
    }

    async fn start_trip(&self, id: TripId) -> Result<Trip> {
        let mut state = self.state.lock();
        state.check(FailurePoint::StartTrip)?;
        let trip = state.trip_mut(id)?;
        match trip.status {
            TripStatus::Active => return Ok(trip.clone()),
            TripStatus::Scheduled => {}
            from => return Err(ClientError::InvalidTransition { trip_id: id, from, action: "start" }),
        }
        trip.status = TripStatus::Active;
        trip.started_at = Some(Utc::now());
        let trip = trip.clone();
        state.notify_trip(&trip, NotificationType::TripStarted, format!("Trip {} started", id));
        Ok(trip)
    }

    async fn complete_trip(&self, id: TripId) -> Result<Trip> {
        let mut state = self.state.lock();
        state.check(FailurePoint::CompleteTrip)?;
        let trip = state.trip_mut(id)?;
        if trip.status.is_terminal() {
            return Err(ClientError::InvalidTransition { trip_id: id, from: trip.status, action: "complete" });
        }
        let now = Utc::now();
        trip.started_at.get_or_insert(now);
        trip.status = TripStatus::Completed;
        trip.completed_at = Some(now);
        let trip = trip.clone();
        if let Some(record) = state.matches.get_mut(&trip.match_id) {
            record.status = MatchStatus::Completed;
        }
        if let Some(ride) = state.rides.get_mut(&trip.ride_request_id) {
            ride.status = RideStatus::Completed;
        }
        state.notify_trip(&trip, NotificationType::TripCompleted, format!("Trip {} completed", id));
        Ok(trip)
    }

    async fn cancel_trip(&self, id: TripId) -> Result<Trip> {
        let mut state = self.state.lock();
        let trip = state.trip_mut(id)?;
        if trip.status.is_terminal() {
            return Err(ClientError::InvalidTransition { trip_id: id, from: trip.status, action: "cancel" });
        }
        trip.status = TripStatus::Cancelled;
        trip.cancelled_at = Some(Utc::now());
        let trip = trip.clone();
        if let Some(record) = state.matches.get_mut(&trip.match_id) {
            record.status = MatchStatus::Cancelled;
        }
        state.notify_trip(&trip, NotificationType::TripCancelled, format!("Trip {} cancelled", id));
        Ok(trip)
    }

    async fn trips_by_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>> {
        let state = self.state.lock();
        state.check(FailurePoint::TripsByDriver)?;
        Ok(state.trips.values().filter(|t| t.driver_id == driver_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl Notifier for InMemoryCollaborators {
    async fn send_notification(&self, notification: &Notification) -> Result<()> {
        let mut state = self.state.lock();
        state.check(FailurePoint::SendNotification)?;
        state.notifications.push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_types::Coordinate;

    fn world() -> InMemoryCollaborators {
        InMemoryCollaborators::with_stations(vec![Station {
            id: StationId(1),
            name: "Central".into(),
            location: Coordinate::new(0.0, 0.001),
        }])
    }

    async fn ride(world: &InMemoryCollaborators, rider: u64, eta: &str) -> RideRequest {
        world
            .create_ride_request(NewRideRequest {
                rider_id: UserId(rider),
                station_id: StationId(1),
                eta: eta.parse().unwrap(),
                destination: Coordinate::new(0.0, 0.01),
            })
            .await
            .unwrap()
    }

    fn new_trip(match_id: MatchId) -> NewTrip {
        NewTrip {
            match_id,
            ride_request_id: RideRequestId(1),
            rider_id: UserId(10),
            driver_id: DriverId(1),
            driver_user_id: UserId(50),
            pickup_station_id: StationId(1),
            destination: Coordinate::new(0.0, 0.01),
            scheduled_at: "10:00".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn riders_filtered_by_eta_and_status() {
        let world = world();
        let early = ride(&world, 10, "10:03").await;
        let _late = ride(&world, 11, "10:30").await;
        let matched = ride(&world, 12, "10:01").await;
        world.update_ride_status(matched.id, RideStatus::Matched).await.unwrap();

        let riders = world.riders_by_station(StationId(1), "10:05".parse().unwrap()).await.unwrap();
        assert_eq!(riders.len(), 1);
        assert_eq!(riders[0].id, early.id);
        assert!(world.riders_by_station(StationId(2), SimTime::END_OF_DAY).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_ride_request_requires_known_station() {
        let world = world();
        let err = world
            .create_ride_request(NewRideRequest {
                rider_id: UserId(1),
                station_id: StationId(9),
                eta: SimTime::default(),
                destination: Coordinate::new(0.0, 0.0),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound { entity: "station", .. }));
    }

    #[tokio::test]
    async fn create_match_is_idempotent_on_key() {
        let world = world();
        let key = MatchKey { driver_id: DriverId(1), station_id: StationId(1), timestamp: SimTime::default() };
        let first = world.create_match(key, UserId(10), RideRequestId(1)).await.unwrap();
        let second = world.create_match(key, UserId(11), RideRequestId(2)).await.unwrap();
        assert!(matches!(first, MatchCreation::Created(_)));
        assert_eq!(second, MatchCreation::Existing(first.id()));
        assert_eq!(world.matches().len(), 1);
        assert_eq!(world.find_match(&key).await.unwrap().unwrap().rider_id, UserId(10));
    }

    #[tokio::test]
    async fn trip_transitions_follow_lifecycle() {
        let world = world();
        let trip_id = world.create_trip(new_trip(MatchId(1))).await.unwrap();
        assert_eq!(world.create_trip(new_trip(MatchId(1))).await.unwrap(), trip_id);

        let started = world.start_trip(trip_id).await.unwrap();
        assert_eq!(started.status, TripStatus::Active);
        assert_eq!(world.start_trip(trip_id).await.unwrap().status, TripStatus::Active);

        let completed = world.complete_trip(trip_id).await.unwrap();
        assert_eq!(completed.status, TripStatus::Completed);
        assert!(completed.completed_at.is_some());

        assert!(matches!(
            world.start_trip(trip_id).await,
            Err(ClientError::InvalidTransition { action: "start", .. })
        ));
        tokio_test::assert_err!(world.complete_trip(trip_id).await);
        tokio_test::assert_err!(world.cancel_trip(trip_id).await);
    }

    #[tokio::test]
    async fn completing_scheduled_trip_stamps_start_and_closes_match() {
        let world = world();
        let key = MatchKey { driver_id: DriverId(1), station_id: StationId(1), timestamp: SimTime::default() };
        let match_id = world.create_match(key, UserId(10), RideRequestId(1)).await.unwrap().id();
        let trip_id = world.create_trip(new_trip(match_id)).await.unwrap();

        let trip = world.complete_trip(trip_id).await.unwrap();
        assert!(trip.started_at.is_some());
        assert_eq!(world.matches()[0].status, MatchStatus::Completed);

        let kinds: Vec<_> = world.notifications_for(UserId(50)).iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationType::TripScheduled, NotificationType::TripCompleted]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_transport_errors() {
        let world = world();
        world.inject_failure(FailurePoint::ListStations);
        let err = world.list_stations().await.unwrap_err();
        assert!(err.is_transient());
        world.clear_failure(FailurePoint::ListStations);
        assert_eq!(world.list_stations().await.unwrap().len(), 1);
    }
}
