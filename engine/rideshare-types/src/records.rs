//! Records owned by the station, ride request, match, trip and notification services

use crate::geo::Coordinate;
use crate::ids::{DriverId, MatchId, RideRequestId, StationId, TripId, UserId};
use crate::sim_time::SimTime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub location: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Looking,
    Matched,
    Completed,
    Cancelled,
}

/// Rider demand at a station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: RideRequestId,
    pub rider_id: UserId,
    pub station_id: StationId,
    /// Expected arrival time at the station
    pub eta: SimTime,
    pub destination: Coordinate,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a ride request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRideRequest {
    pub rider_id: UserId,
    pub station_id: StationId,
    pub eta: SimTime,
    pub destination: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Active,
    Completed,
    Cancelled,
}

/// Natural key of a candidate event; at most one match exists per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchKey {
    pub driver_id: DriverId,
    pub station_id: StationId,
    pub timestamp: SimTime,
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "driver={} station={} at={}",
            self.driver_id, self.station_id, self.timestamp
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub rider_id: UserId,
    pub driver_id: DriverId,
    pub station_id: StationId,
    pub ride_request_id: RideRequestId,
    /// Driver logical time of the candidate event that produced the match
    pub timestamp: SimTime,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            driver_id: self.driver_id,
            station_id: self.station_id,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TripStatus::Scheduled => "SCHEDULED",
            TripStatus::Active => "ACTIVE",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub match_id: MatchId,
    pub ride_request_id: RideRequestId,
    pub rider_id: UserId,
    pub driver_id: DriverId,
    /// User account behind the driver; receives trip notifications
    pub driver_user_id: UserId,
    pub pickup_station_id: StationId,
    pub destination: Coordinate,
    pub status: TripStatus,
    pub scheduled_at: SimTime,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Payload for scheduling a trip from a fresh match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub match_id: MatchId,
    pub ride_request_id: RideRequestId,
    pub rider_id: UserId,
    pub driver_id: DriverId,
    pub driver_user_id: UserId,
    pub pickup_station_id: StationId,
    pub destination: Coordinate,
    pub scheduled_at: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    MatchFound,
    TripScheduled,
    TripStarted,
    TripCompleted,
    TripCancelled,
    DriverNearby,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub message: String,
    #[serde(rename = "notification_type")]
    pub kind: NotificationType,
}

impl Notification {
    pub fn new(user_id: UserId, kind: NotificationType, message: impl Into<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
            kind,
        }
    }
}
