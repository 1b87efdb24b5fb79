//! Candidate-match event carried on the matching queue
//!
//! Encoded as a flat JSON object. Field names are part of the wire contract between the
//! simulator and the matcher and must not change.

use crate::geo::Coordinate;
use crate::ids::{DriverId, StationId, UserId};
use crate::records::MatchKey;
use crate::sim_time::SimTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub driver_id: DriverId,
    pub user_id: UserId,
    pub nearby_station_id: StationId,
    pub nearby_station_name: String,
    pub current_lat: f64,
    pub current_lng: f64,
    /// Driver logical time when proximity was detected
    pub timestamp: SimTime,
    pub free_seats: u32,
    pub destination_lat: f64,
    pub destination_lng: f64,
}

impl CandidateEvent {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.current_lat, self.current_lng)
    }

    pub fn destination(&self) -> Coordinate {
        Coordinate::new(self.destination_lat, self.destination_lng)
    }

    /// Idempotency key for match creation
    pub fn match_key(&self) -> MatchKey {
        MatchKey {
            driver_id: self.driver_id,
            station_id: self.nearby_station_id,
            timestamp: self.timestamp,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
