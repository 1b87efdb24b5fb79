//! Per-event matching algorithm

use crate::config::CoordinatorConfig;
use crate::error::{MatchError, MatchStage, PartialMatchFailure};
use rideshare_types::{
    CandidateEvent, MatchId, MatchRecord, NewTrip, Notification, NotificationType, RideRequest, RideRequestId,
    RideStatus, Station, StationId, TripId, UserId,
};
use service_clients::{notify_best_effort, with_timeout, Collaborators, RouteUpdate};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// What happened to one candidate event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched {
        match_id: MatchId,
        trip_id: TripId,
        ride_request_id: RideRequestId,
        rider_id: UserId,
    },
    /// No eligible rider at the station; the event is discarded
    NoRiders,
    /// The event was already matched and its trip exists; nothing was touched
    Duplicate { match_id: MatchId },
}

/// Outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub processed: u64,
    pub matched: u64,
    pub no_riders: u64,
    pub duplicates: u64,
    /// Failed before the route changed
    pub aborted: u64,
    /// Failed after the route changed
    pub partial: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    matched: AtomicU64,
    no_riders: AtomicU64,
    duplicates: AtomicU64,
    aborted: AtomicU64,
    partial: AtomicU64,
}

pub struct MatchingCoordinator {
    services: Collaborators,
    config: CoordinatorConfig,
    counters: Counters,
}

impl MatchingCoordinator {
    pub fn new(services: Collaborators, config: CoordinatorConfig) -> Self {
        Self { services, config, counters: Counters::default() }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Process one candidate event to completion and log the outcome
    pub async fn process_event(&self, event: &CandidateEvent) -> Result<MatchOutcome, MatchError> {
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        let result = self.match_event(event).await;

        match &result {
            Ok(MatchOutcome::Matched { match_id, trip_id, rider_id, .. }) => {
                self.counters.matched.fetch_add(1, Ordering::Relaxed);
                info!(
                    driver_id = %event.driver_id,
                    station_id = %event.nearby_station_id,
                    rider_id = %rider_id,
                    match_id = %match_id,
                    trip_id = %trip_id,
                    "Matched driver with rider at {}",
                    event.nearby_station_name
                );
            }
            Ok(MatchOutcome::NoRiders) => {
                self.counters.no_riders.fetch_add(1, Ordering::Relaxed);
                debug!(
                    driver_id = %event.driver_id,
                    station_id = %event.nearby_station_id,
                    "No eligible riders, discarding candidate"
                );
            }
            Ok(MatchOutcome::Duplicate { match_id }) => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                info!(
                    driver_id = %event.driver_id,
                    match_id = %match_id,
                    "Candidate already matched, ignoring redelivery"
                );
            }
            Err(MatchError::PartialMatch(failure)) => {
                self.counters.partial.fetch_add(1, Ordering::Relaxed);
                error!(
                    stage = %failure.stage,
                    driver_id = %failure.driver_id,
                    station_id = %failure.station_id,
                    rider_id = %failure.rider_id,
                    ride_request_id = %failure.ride_request_id,
                    timestamp = %failure.timestamp,
                    reason = %failure.reason,
                    "Partial match needs reconciliation: driver route changed but match is incomplete"
                );
            }
            Err(e) => {
                self.counters.aborted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    driver_id = %event.driver_id,
                    station_id = %event.nearby_station_id,
                    "Candidate aborted: {}",
                    e
                );
            }
        }

        result
    }

    async fn match_event(&self, event: &CandidateEvent) -> Result<MatchOutcome, MatchError> {
        let timeout = self.config.remote_timeout();
        let key = event.match_key();
        let max_eta = event.timestamp.saturating_add(self.config.eligibility_window_minutes);

        let existing = with_timeout("find_match", timeout, self.services.matches.find_match(&key))
            .await
            .map_err(MatchError::IdempotencyLookup)?;
        if let Some(record) = existing {
            return self.resume_match(event, record).await;
        }

        let riders = with_timeout(
            "riders_by_station",
            timeout,
            self.services.riders.riders_by_station(event.nearby_station_id, max_eta),
        )
        .await
        .map_err(MatchError::RiderLookup)?;
        let Some(ride) = riders.into_iter().next() else {
            return Ok(MatchOutcome::NoRiders);
        };
        debug!(ride_request_id = %ride.id, eta = %ride.eta, max_eta = %max_eta, "Selected rider");

        let station = self.station(event.nearby_station_id).await?;
        let update = RouteUpdate::push_front(event.driver_id, &station);
        let push = with_timeout("update_driver_route", timeout, self.services.routes.update_driver_route(&update))
            .await
            .map_err(|source| MatchError::RouteMutation {
                driver_id: event.driver_id,
                station_id: station.id,
                source,
            })?;
        debug!(driver_id = %event.driver_id, outcome = ?push, "Route updated");

        // From here on the route is changed and failures are partial
        let partial = |stage: MatchStage, reason: String| {
            MatchError::PartialMatch(Box::new(PartialMatchFailure {
                stage,
                driver_id: event.driver_id,
                station_id: station.id,
                rider_id: ride.rider_id,
                ride_request_id: ride.id,
                timestamp: event.timestamp,
                reason,
            }))
        };

        let current = with_timeout("get_ride_request", timeout, self.services.riders.get_ride_request(ride.id))
            .await
            .map_err(|e| partial(MatchStage::RiderRecheck, e.to_string()))?;
        if current.status != RideStatus::Looking {
            return Err(partial(
                MatchStage::RiderRecheck,
                format!("ride request is {:?}, expected LOOKING", current.status),
            ));
        }

        with_timeout(
            "update_ride_status",
            timeout,
            self.services.riders.update_ride_status(ride.id, RideStatus::Matched),
        )
        .await
        .map_err(|e| partial(MatchStage::RiderStatus, e.to_string()))?;

        let match_id = with_timeout(
            "create_match",
            timeout,
            self.services.matches.create_match(key, ride.rider_id, ride.id),
        )
        .await
        .map_err(|e| partial(MatchStage::MatchRecord, e.to_string()))?
        .id();

        let trip_id = with_timeout("create_trip", timeout, self.services.trips.create_trip(new_trip(event, &ride, match_id)))
            .await
            .map_err(|e| partial(MatchStage::TripCreation, e.to_string()))?;

        self.notify_match(event, &ride, &station).await;

        Ok(MatchOutcome::Matched { match_id, trip_id, ride_request_id: ride.id, rider_id: ride.rider_id })
    }

    /// Redelivery of an event that already produced a match. The trip is created if an
    /// earlier attempt stopped short of it; otherwise the event is a duplicate.
    async fn resume_match(&self, event: &CandidateEvent, record: MatchRecord) -> Result<MatchOutcome, MatchError> {
        let timeout = self.config.remote_timeout();
        let trips = with_timeout("trips_by_driver", timeout, self.services.trips.trips_by_driver(event.driver_id))
            .await
            .map_err(MatchError::IdempotencyLookup)?;
        if trips.iter().any(|trip| trip.match_id == record.id) {
            return Ok(MatchOutcome::Duplicate { match_id: record.id });
        }

        info!(
            match_id = %record.id,
            driver_id = %event.driver_id,
            ride_request_id = %record.ride_request_id,
            "Match has no trip, resuming trip creation"
        );
        let partial = |reason: String| {
            MatchError::PartialMatch(Box::new(PartialMatchFailure {
                stage: MatchStage::TripCreation,
                driver_id: event.driver_id,
                station_id: record.station_id,
                rider_id: record.rider_id,
                ride_request_id: record.ride_request_id,
                timestamp: event.timestamp,
                reason,
            }))
        };

        let ride = with_timeout(
            "get_ride_request",
            timeout,
            self.services.riders.get_ride_request(record.ride_request_id),
        )
        .await
        .map_err(|e| partial(e.to_string()))?;
        let trip_id = with_timeout("create_trip", timeout, self.services.trips.create_trip(new_trip(event, &ride, record.id)))
            .await
            .map_err(|e| partial(e.to_string()))?;

        match self.station(record.station_id).await {
            Ok(station) => self.notify_match(event, &ride, &station).await,
            Err(e) => warn!(match_id = %record.id, "Skipping match notifications: {}", e),
        }

        Ok(MatchOutcome::Matched { match_id: record.id, trip_id, ride_request_id: ride.id, rider_id: ride.rider_id })
    }

    async fn station(&self, station_id: StationId) -> Result<Station, MatchError> {
        let stations = with_timeout("list_stations", self.config.remote_timeout(), self.services.stations.list_stations())
            .await
            .map_err(MatchError::StationLookup)?;
        stations
            .into_iter()
            .find(|s| s.id == station_id)
            .ok_or(MatchError::UnknownStation { station_id })
    }

    async fn notify_match(&self, event: &CandidateEvent, ride: &RideRequest, station: &Station) {
        let timeout = self.config.remote_timeout();
        let to_rider = Notification::new(
            ride.rider_id,
            NotificationType::MatchFound,
            format!("A driver will pick you up at {} around {}", station.name, event.timestamp),
        );
        let to_driver = Notification::new(
            event.user_id,
            NotificationType::MatchFound,
            format!("Rider waiting at {}, head there now", station.name),
        );
        notify_best_effort(self.services.notifier.as_ref(), to_rider, timeout).await;
        notify_best_effort(self.services.notifier.as_ref(), to_driver, timeout).await;
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            matched: self.counters.matched.load(Ordering::Relaxed),
            no_riders: self.counters.no_riders.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            aborted: self.counters.aborted.load(Ordering::Relaxed),
            partial: self.counters.partial.load(Ordering::Relaxed),
        }
    }
}

fn new_trip(event: &CandidateEvent, ride: &RideRequest, match_id: MatchId) -> NewTrip {
    NewTrip {
        match_id,
        ride_request_id: ride.id,
        rider_id: ride.rider_id,
        driver_id: event.driver_id,
        driver_user_id: event.user_id,
        pickup_station_id: event.nearby_station_id,
        destination: ride.destination,
        scheduled_at: event.timestamp,
    }
}
