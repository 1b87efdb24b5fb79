//! Ordered waypoint queue

use rideshare_types::{Coordinate, StationId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One stop on a driver route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub location: Coordinate,

    /// Set only for a station inserted by a match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<StationId>,
}

impl Waypoint {
    pub fn at(location: Coordinate) -> Self {
        Self { location, station_id: None }
    }

    pub fn station(station_id: StationId, location: Coordinate) -> Self {
        Self { location, station_id: Some(station_id) }
    }

    pub fn is_station(&self, station_id: StationId) -> bool {
        self.station_id == Some(station_id)
    }
}

/// FIFO of waypoints; the head is the next position the driver moves to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteQueue(VecDeque<Waypoint>);

impl RouteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<&Waypoint> {
        self.0.front()
    }

    pub fn last(&self) -> Option<&Waypoint> {
        self.0.back()
    }

    pub fn pop_front(&mut self) -> Option<Waypoint> {
        self.0.pop_front()
    }

    pub fn push_front(&mut self, waypoint: Waypoint) {
        self.0.push_front(waypoint);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.0.iter()
    }
}

impl FromIterator<Waypoint> for RouteQueue {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Coordinate>> for RouteQueue {
    fn from(points: Vec<Coordinate>) -> Self {
        points.into_iter().map(Waypoint::at).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_waypoints_serialize_without_station() {
        let route = RouteQueue::from(vec![Coordinate::new(1.0, 2.0)]);
        let json = serde_json::to_string(&route).unwrap();
        assert_eq!(json, r#"[{"location":{"lat":1.0,"lng":2.0}}]"#);
    }

    #[test]
    fn push_front_becomes_head() {
        let mut route = RouteQueue::from(vec![Coordinate::new(0.0, 0.0)]);
        route.push_front(Waypoint::station(StationId(4), Coordinate::new(0.0, 1.0)));
        assert_eq!(route.len(), 2);
        assert!(route.peek().unwrap().is_station(StationId(4)));
        assert_eq!(route.last().unwrap().station_id, None);
    }
}
