//! # geo-proximity
//!
//! Decides whether a driver is within a threshold distance of a station. Distances are
//! WGS84 geodesics computed by the `geo` crate. A latitude/longitude bounding box in front
//! of the geodesic call discards stations that are obviously out of range; the box is
//! sized conservatively so it can never drop a station the geodesic test would accept.

use geo::{GeodesicDistance, Point};
use rideshare_types::{Coordinate, Station, DEFAULT_PROXIMITY_METERS};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, warn};

/// Two coordinates closer than this are treated as the same point
pub const COORDINATE_EPSILON_METERS: f64 = 1.0;

/// Equatorial length of one degree, used to size the pre-filter box
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Above this absolute latitude longitude degrees collapse and the box is skipped
const PREFILTER_MAX_LATITUDE: f64 = 85.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProximityError {
    #[error("invalid coordinate {coordinate}")]
    InvalidCoordinate { coordinate: Coordinate },
}

pub type Result<T> = std::result::Result<T, ProximityError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    /// Inclusive proximity threshold in meters
    pub threshold_meters: f64,

    /// Multiplier applied to the pre-filter box half-width
    pub prefilter_margin: f64,

    pub prefilter_enabled: bool,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            threshold_meters: DEFAULT_PROXIMITY_METERS,
            prefilter_margin: 1.5,
            prefilter_enabled: true,
        }
    }
}

/// Result of a proximity test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proximity {
    pub nearby: bool,
    pub distance_meters: f64,
}

fn validate(coordinate: Coordinate) -> Result<Coordinate> {
    if coordinate.is_valid() {
        Ok(coordinate)
    } else {
        Err(ProximityError::InvalidCoordinate { coordinate })
    }
}

/// Geodesic distance between two coordinates in meters.
///
/// Arguments are put in a canonical order before the computation so that
/// `distance_meters(a, b)` and `distance_meters(b, a)` are bit-identical.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> Result<f64> {
    let a = validate(a)?;
    let b = validate(b)?;
    let (first, second) = match (a.lat, a.lng).partial_cmp(&(b.lat, b.lng)) {
        Some(Ordering::Greater) => (b, a),
        _ => (a, b),
    };
    let p1 = Point::new(first.lng, first.lat);
    let p2 = Point::new(second.lng, second.lat);
    Ok(p1.geodesic_distance(&p2))
}

/// Proximity detector bound to a threshold
#[derive(Debug, Clone)]
pub struct ProximityDetector {
    config: ProximityConfig,
}

impl Default for ProximityDetector {
    fn default() -> Self {
        Self::new(ProximityConfig::default())
    }
}

impl ProximityDetector {
    pub fn new(config: ProximityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProximityConfig {
        &self.config
    }

    /// Threshold in effect; non-positive or non-finite settings fall back to the default
    pub fn threshold_meters(&self) -> f64 {
        effective_threshold(self.config.threshold_meters)
    }

    pub fn distance(&self, a: Coordinate, b: Coordinate) -> Result<f64> {
        distance_meters(a, b)
    }

    pub fn is_nearby(&self, a: Coordinate, b: Coordinate) -> Result<Proximity> {
        self.is_nearby_within(a, b, self.config.threshold_meters)
    }

    /// Proximity test with an explicit threshold. The comparison is inclusive.
    pub fn is_nearby_within(&self, a: Coordinate, b: Coordinate, threshold: f64) -> Result<Proximity> {
        let threshold = effective_threshold(threshold);
        let distance_meters = distance_meters(a, b)?;
        Ok(Proximity {
            nearby: distance_meters <= threshold,
            distance_meters,
        })
    }

    /// Canonical coordinate equality used for route head checks
    pub fn same_point(&self, a: Coordinate, b: Coordinate) -> Result<bool> {
        Ok(distance_meters(a, b)? <= COORDINATE_EPSILON_METERS)
    }

    /// Whether `station` can be discarded without a geodesic computation
    fn outside_prefilter(&self, position: Coordinate, station: Coordinate) -> bool {
        if !self.config.prefilter_enabled {
            return false;
        }
        let max_lat = position.lat.abs().max(station.lat.abs());
        if max_lat > PREFILTER_MAX_LATITUDE {
            return false;
        }
        let margin = self.config.prefilter_margin.max(1.0);
        let half_lat = self.threshold_meters() * margin / METERS_PER_DEGREE;
        if (position.lat - station.lat).abs() > half_lat {
            return true;
        }
        let half_lng = half_lat / max_lat.to_radians().cos();
        let mut dlng = (position.lng - station.lng).abs();
        if dlng > 180.0 {
            dlng = 360.0 - dlng;
        }
        dlng > half_lng
    }

    /// First station, in directory order, within the threshold of `position`.
    ///
    /// Stations with bad coordinates are logged and skipped.
    pub fn first_nearby<'a>(
        &self,
        position: Coordinate,
        stations: &'a [Station],
    ) -> Option<(&'a Station, f64)> {
        if !position.is_valid() {
            warn!("Skipping proximity scan for invalid driver position {}", position);
            return None;
        }
        let threshold = self.threshold_meters();
        for station in stations {
            if station.location.is_valid() && self.outside_prefilter(position, station.location) {
                continue;
            }
            match distance_meters(position, station.location) {
                Ok(distance) if distance <= threshold => {
                    debug!(
                        station_id = %station.id,
                        distance_m = distance,
                        "Driver within range of station {}",
                        station.name
                    );
                    return Some((station, distance));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(station_id = %station.id, "Ignoring station in proximity scan: {}", e);
                }
            }
        }
        None
    }
}

fn effective_threshold(threshold: f64) -> f64 {
    if threshold.is_finite() && threshold > 0.0 {
        threshold
    } else {
        DEFAULT_PROXIMITY_METERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rideshare_types::StationId;

    fn station(id: u64, lat: f64, lng: f64) -> Station {
        Station {
            id: StationId(id),
            name: format!("S{id}"),
            location: Coordinate::new(lat, lng),
        }
    }

    #[test]
    fn stations_111m_apart_are_not_nearby() {
        let detector = ProximityDetector::default();
        let p = detector
            .is_nearby(Coordinate::new(0.0, 0.001), Coordinate::new(0.0, 0.002))
            .unwrap();
        assert!(!p.nearby);
        assert!((p.distance_meters - 111.3).abs() < 1.0, "{}", p.distance_meters);
    }

    #[test]
    fn close_positions_are_nearby() {
        let detector = ProximityDetector::default();
        let p = detector
            .is_nearby(Coordinate::new(0.0, 0.0009), Coordinate::new(0.0, 0.001))
            .unwrap();
        assert!(p.nearby);
        assert!(p.distance_meters < 20.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let detector = ProximityDetector::default();
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.001);
        let d = detector.distance(a, b).unwrap();
        assert!(detector.is_nearby_within(a, b, d).unwrap().nearby);
        assert!(!detector.is_nearby_within(a, b, d - 0.01).unwrap().nearby);
    }

    #[test]
    fn non_positive_threshold_uses_default() {
        let detector = ProximityDetector::new(ProximityConfig {
            threshold_meters: 0.0,
            ..Default::default()
        });
        assert_eq!(detector.threshold_meters(), DEFAULT_PROXIMITY_METERS);
        let p = detector
            .is_nearby_within(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.0005), -3.0)
            .unwrap();
        assert!(p.nearby);
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let good = Coordinate::new(10.0, 10.0);
        assert!(matches!(
            distance_meters(Coordinate::new(f64::NAN, 0.0), good),
            Err(ProximityError::InvalidCoordinate { .. })
        ));
        assert!(distance_meters(good, Coordinate::new(0.0, 181.0)).is_err());
    }

    #[test]
    fn same_point_uses_one_meter_epsilon() {
        let detector = ProximityDetector::default();
        let a = Coordinate::new(51.5, -0.12);
        assert!(detector.same_point(a, a).unwrap());
        assert!(detector.same_point(a, Coordinate::new(51.500005, -0.12)).unwrap());
        assert!(!detector.same_point(a, Coordinate::new(51.5001, -0.12)).unwrap());
    }

    #[test]
    fn first_nearby_returns_first_match_in_directory_order() {
        let detector = ProximityDetector::default();
        let stations = vec![
            station(1, 0.0, 0.5),
            station(2, 0.0, 0.0003),
            station(3, 0.0, 0.0001),
        ];
        let (hit, _) = detector.first_nearby(Coordinate::new(0.0, 0.0), &stations).unwrap();
        assert_eq!(hit.id, StationId(2));
    }

    #[test]
    fn first_nearby_skips_bad_stations() {
        let detector = ProximityDetector::default();
        let stations = vec![station(1, f64::NAN, 0.0), station(2, 0.0, 0.0002)];
        let (hit, _) = detector.first_nearby(Coordinate::new(0.0, 0.0), &stations).unwrap();
        assert_eq!(hit.id, StationId(2));
        assert!(detector
            .first_nearby(Coordinate::new(99.0, 0.0), &stations)
            .is_none());
    }

    #[test]
    fn prefilter_keeps_stations_at_high_latitude_and_across_antimeridian() {
        let detector = ProximityDetector::default();
        // ~0.0015 degrees of longitude is roughly 60 m at 66N
        let north = Coordinate::new(66.0, 25.0);
        let stations = vec![station(1, 66.0, 25.0015)];
        assert!(detector.first_nearby(north, &stations).is_some());

        let east = Coordinate::new(0.0, 179.9997);
        let stations = vec![station(2, 0.0, -179.9998)];
        assert!(detector.first_nearby(east, &stations).is_some());
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(
            lat1 in -89.0f64..89.0, lng1 in -179.0f64..179.0,
            lat2 in -89.0f64..89.0, lng2 in -179.0f64..179.0,
        ) {
            let a = Coordinate::new(lat1, lng1);
            let b = Coordinate::new(lat2, lng2);
            prop_assert_eq!(distance_meters(a, b).unwrap(), distance_meters(b, a).unwrap());
        }

        #[test]
        fn prefilter_never_rejects_a_nearby_station(
            lat in -80.0f64..80.0, lng in -179.0f64..179.0,
            dlat in -0.002f64..0.002, dlng in -0.004f64..0.004,
        ) {
            let detector = ProximityDetector::default();
            let unfiltered = ProximityDetector::new(ProximityConfig {
                prefilter_enabled: false,
                ..Default::default()
            });
            let position = Coordinate::new(lat, lng);
            let stations = vec![station(1, lat + dlat, lng + dlng)];
            prop_assert_eq!(
                detector.first_nearby(position, &stations).is_some(),
                unfiltered.first_nearby(position, &stations).is_some()
            );
        }
    }
}
