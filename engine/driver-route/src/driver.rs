//! Driver aggregate and its per-tick transition

use crate::error::RouteError;
use crate::route::{RouteQueue, Waypoint};
use geo_proximity::{distance_meters, ProximityDetector, COORDINATE_EPSILON_METERS};
use rideshare_types::{
    CandidateEvent, Coordinate, DriverId, Notification, NotificationType, SimTime, Station,
    StationId, UserId, WAIT_TICKS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Which transition the next step takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Moving,
    Waiting,
    Complete,
}

/// Side effect requested by a step; executed after the aggregate is persisted
#[derive(Debug, Clone, PartialEq)]
pub enum RouteEffect {
    PublishCandidate(CandidateEvent),
    StartTrips { driver_id: DriverId },
    CompleteTrips { driver_id: DriverId },
    Retire { driver_id: DriverId },
    Notify(Notification),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// State the step ran in
    pub state: RouteState,
    pub effects: Vec<RouteEffect>,
}

impl StepOutcome {
    fn idle(state: RouteState) -> Self {
        Self { state, effects: Vec::new() }
    }

    pub fn published(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, RouteEffect::PublishCandidate(_)))
    }

    pub fn retired(&self) -> bool {
        self.effects.iter().any(|e| matches!(e, RouteEffect::Retire { .. }))
    }
}

/// Inputs shared by every driver step within one tick
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Station directory snapshot; `None` when the fetch failed this tick
    pub stations: Option<&'a [Station]>,
    pub detector: &'a ProximityDetector,
    pub wait_ticks: u32,
    pub minutes_per_tick: u32,
}

impl<'a> StepContext<'a> {
    pub fn new(stations: Option<&'a [Station]>, detector: &'a ProximityDetector) -> Self {
        Self { stations, detector, wait_ticks: WAIT_TICKS, minutes_per_tick: 1 }
    }
}

/// Result of a `push_front` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushOutcome {
    Inserted,
    /// The station was already waiting at the head; nothing changed
    AlreadyAtHead,
}

/// Driver route aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRoute {
    driver_id: DriverId,
    user_id: UserId,
    position: Coordinate,
    route: RouteQueue,
    free_seats: u32,
    sim_time: SimTime,
    is_simulating: bool,
    matched_station_id: Option<StationId>,
    wait_counter: u32,
    #[serde(default)]
    version: u64,
}

impl DriverRoute {
    /// Create a driver positioned at the first waypoint of `route`. The driver does not
    /// take part in ticks until its simulation is started.
    pub fn new(
        driver_id: DriverId,
        user_id: UserId,
        route: RouteQueue,
        free_seats: u32,
        start: SimTime,
    ) -> Result<Self, RouteError> {
        let first = route.peek().ok_or(RouteError::EmptyRoute { driver_id })?;
        if let Some(bad) = route.iter().find(|w| !w.location.is_valid()) {
            return Err(RouteError::InvalidWaypoint { driver_id, location: bad.location });
        }
        Ok(Self {
            driver_id,
            user_id,
            position: first.location,
            route,
            free_seats,
            sim_time: start,
            is_simulating: false,
            matched_station_id: None,
            wait_counter: 0,
            version: 0,
        })
    }

    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }

    pub fn route(&self) -> &RouteQueue {
        &self.route
    }

    pub fn free_seats(&self) -> u32 {
        self.free_seats
    }

    pub fn sim_time(&self) -> SimTime {
        self.sim_time
    }

    pub fn is_simulating(&self) -> bool {
        self.is_simulating
    }

    pub fn matched_station_id(&self) -> Option<StationId> {
        self.matched_station_id
    }

    pub fn wait_counter(&self) -> u32 {
        self.wait_counter
    }

    /// Store revision this copy was read at
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn start_simulation(&mut self) {
        self.is_simulating = true;
    }

    pub fn stop_simulation(&mut self) {
        self.is_simulating = false;
    }

    pub fn state(&self) -> RouteState {
        match (self.route.peek(), self.matched_station_id) {
            (None, _) => RouteState::Complete,
            (Some(head), Some(station)) if head.is_station(station) => RouteState::Waiting,
            _ => RouteState::Moving,
        }
    }

    /// Advance the driver by one tick.
    ///
    /// Mutates only this aggregate; everything that touches other services is returned
    /// as effects. Inactive drivers are left untouched.
    pub fn step(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        if !self.is_simulating {
            return StepOutcome::idle(self.state());
        }

        self.repair_head();

        match self.state() {
            RouteState::Waiting => self.step_waiting(ctx),
            RouteState::Moving => self.step_moving(ctx),
            RouteState::Complete => self.step_complete(),
        }
    }

    /// Drop a matched marker whose station is no longer at the head
    fn repair_head(&mut self) {
        let Some(station) = self.matched_station_id else {
            return;
        };
        let head_matches = self.route.peek().map(|w| w.is_station(station)).unwrap_or(false);
        if !head_matches {
            warn!(
                driver_id = %self.driver_id,
                station_id = %station,
                "Matched station is not at the head of the route, clearing marker"
            );
            self.matched_station_id = None;
            self.wait_counter = 0;
        }
    }

    fn step_waiting(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let wait_ticks = ctx.wait_ticks.max(1);
        self.wait_counter = (self.wait_counter + 1).min(wait_ticks);

        if self.wait_counter < wait_ticks {
            debug!(
                driver_id = %self.driver_id,
                "Driver waiting at station ({}/{})",
                self.wait_counter,
                wait_ticks
            );
            return StepOutcome::idle(RouteState::Waiting);
        }

        let station = self.route.pop_front().and_then(|w| w.station_id);
        self.matched_station_id = None;
        self.wait_counter = 0;
        info!(
            driver_id = %self.driver_id,
            station_id = ?station,
            sim_time = %self.sim_time,
            "Wait complete, departing station"
        );

        StepOutcome {
            state: RouteState::Waiting,
            effects: vec![RouteEffect::StartTrips { driver_id: self.driver_id }],
        }
    }

    fn step_moving(&mut self, ctx: &StepContext<'_>) -> StepOutcome {
        let mut outcome = StepOutcome::idle(RouteState::Moving);
        let Some(next) = self.route.pop_front() else {
            return outcome;
        };
        self.position = next.location;
        self.sim_time = self.sim_time.advance(ctx.minutes_per_tick);
        debug!(
            driver_id = %self.driver_id,
            sim_time = %self.sim_time,
            "Driver moved to {}",
            self.position
        );

        let Some(stations) = ctx.stations else {
            return outcome;
        };
        if let Some((station, distance)) = ctx.detector.first_nearby(self.position, stations) {
            info!(
                driver_id = %self.driver_id,
                station_id = %station.id,
                distance_m = distance,
                "Driver near station {}",
                station.name
            );
            let event = self.candidate_event(station);
            outcome.effects.push(RouteEffect::PublishCandidate(event));
            outcome.effects.push(RouteEffect::Notify(Notification::new(
                self.user_id,
                NotificationType::DriverNearby,
                format!("You are near {} at {}", station.name, self.sim_time),
            )));
        }
        outcome
    }

    fn step_complete(&mut self) -> StepOutcome {
        self.is_simulating = false;
        self.matched_station_id = None;
        self.wait_counter = 0;
        info!(driver_id = %self.driver_id, sim_time = %self.sim_time, "Route complete, retiring driver");
        StepOutcome {
            state: RouteState::Complete,
            effects: vec![
                RouteEffect::CompleteTrips { driver_id: self.driver_id },
                RouteEffect::Retire { driver_id: self.driver_id },
            ],
        }
    }

    fn candidate_event(&self, station: &Station) -> CandidateEvent {
        let destination = self.route.last().map(|w| w.location).unwrap_or(self.position);
        CandidateEvent {
            driver_id: self.driver_id,
            user_id: self.user_id,
            nearby_station_id: station.id,
            nearby_station_name: station.name.clone(),
            current_lat: self.position.lat,
            current_lng: self.position.lng,
            timestamp: self.sim_time,
            free_seats: self.free_seats,
            destination_lat: destination.lat,
            destination_lng: destination.lng,
        }
    }

    /// Insert a matched station in front of the route.
    ///
    /// A repeat for the station already waiting at the head is a no-op.
    pub fn push_front(
        &mut self,
        station_id: StationId,
        location: Coordinate,
    ) -> Result<PushOutcome, RouteError> {
        if !location.is_valid() {
            return Err(RouteError::InvalidStation { station_id, location });
        }
        if !self.is_simulating {
            return Err(RouteError::NotSimulating { driver_id: self.driver_id });
        }

        self.repair_head();
        if let Some(current) = self.matched_station_id {
            if current != station_id {
                return Err(RouteError::AlreadyMatched {
                    driver_id: self.driver_id,
                    current,
                    requested: station_id,
                });
            }
            if let Some(head) = self.route.peek() {
                let moved = distance_meters(head.location, location)
                    .map(|d| d > COORDINATE_EPSILON_METERS)
                    .unwrap_or(true);
                if moved {
                    warn!(
                        driver_id = %self.driver_id,
                        station_id = %station_id,
                        "Repeated push reports station at {} but head is {}, keeping head",
                        location,
                        head.location
                    );
                }
            }
            return Ok(PushOutcome::AlreadyAtHead);
        }

        self.route.push_front(Waypoint::station(station_id, location));
        self.matched_station_id = Some(station_id);
        self.wait_counter = 0;
        info!(
            driver_id = %self.driver_id,
            station_id = %station_id,
            route_len = self.route.len(),
            "Station pushed to head of route"
        );
        Ok(PushOutcome::Inserted)
    }
}
