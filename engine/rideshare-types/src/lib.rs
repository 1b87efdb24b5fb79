//! # rideshare-types
//!
//! Types shared by every crate of the station rideshare simulation: identifiers, the
//! coordinate and logical clock primitives, the records owned by the external services
//! (stations, ride requests, matches, trips, notifications) and the candidate-match
//! event that travels over the matching queue.

pub mod event;
pub mod geo;
pub mod ids;
pub mod records;
pub mod sim_time;

pub use event::CandidateEvent;
pub use geo::Coordinate;
pub use ids::{DriverId, MatchId, RideRequestId, StationId, TripId, UserId};
pub use records::{
    MatchKey, MatchRecord, MatchStatus, NewRideRequest, NewTrip, Notification, NotificationType,
    RideRequest, RideStatus, Station, Trip, TripStatus,
};
pub use sim_time::{SimTime, SimTimeError};

/// Number of ticks a driver waits at a matched station before departing.
pub const WAIT_TICKS: u32 = 5;

/// Default proximity threshold between a driver and a station, in meters.
pub const DEFAULT_PROXIMITY_METERS: f64 = 100.0;

/// Width of the rider eligibility window after the driver's logical time, in minutes.
pub const ELIGIBILITY_WINDOW_MINUTES: u32 = 5;
