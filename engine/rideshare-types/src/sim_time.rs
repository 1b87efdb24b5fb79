//! Logical simulation time-of-day
//!
//! Every driver carries its own `SimTime`. Each movement tick advances it by a fixed
//! number of simulated minutes. The value is rendered as zero-padded `HH:MM` on the wire.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimTimeError {
    #[error("invalid simulation time '{0}', expected HH:MM")]
    Invalid(String),
}

/// Minutes since midnight, always `< 1440`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(u16);

impl SimTime {
    /// Latest representable time of day, `23:59`
    pub const END_OF_DAY: SimTime = SimTime(MINUTES_PER_DAY - 1);

    pub fn from_hm(hour: u16, minute: u16) -> Result<Self, SimTimeError> {
        if hour >= 24 || minute >= 60 {
            return Err(SimTimeError::Invalid(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self(hour * 60 + minute))
    }

    pub fn hour(&self) -> u16 {
        self.0 / 60
    }

    pub fn minute(&self) -> u16 {
        self.0 % 60
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        self.0
    }

    /// Advance by `minutes`, wrapping past midnight
    pub fn advance(self, minutes: u32) -> Self {
        let total = (u32::from(self.0) + minutes) % u32::from(MINUTES_PER_DAY);
        Self(total as u16)
    }

    /// Add `minutes`, clamping at `23:59` instead of wrapping
    pub fn saturating_add(self, minutes: u32) -> Self {
        let total = u32::from(self.0).saturating_add(minutes);
        if total >= u32::from(MINUTES_PER_DAY) {
            Self::END_OF_DAY
        } else {
            Self(total as u16)
        }
    }
}

impl Default for SimTime {
    /// Drivers start the day at `10:00`
    fn default() -> Self {
        Self(10 * 60)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for SimTime {
    type Err = SimTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SimTimeError::Invalid(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u16 = h.parse().map_err(|_| invalid())?;
        let minute: u16 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_zero_padded() {
        let t: SimTime = "9:05".parse().unwrap();
        assert_eq!(t.to_string(), "09:05");
        assert_eq!("23:59".parse::<SimTime>().unwrap(), SimTime::END_OF_DAY);
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "10", "24:00", "10:60", "ab:cd", "10:5", "-1:00"] {
            assert!(bad.parse::<SimTime>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn advance_wraps_but_saturating_add_clamps() {
        let t: SimTime = "23:58".parse().unwrap();
        assert_eq!(t.advance(3).to_string(), "00:01");
        assert_eq!(t.saturating_add(5), SimTime::END_OF_DAY);
        assert_eq!(SimTime::default().saturating_add(5).to_string(), "10:05");
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&SimTime::default()).unwrap();
        assert_eq!(json, "\"10:00\"");
        let back: SimTime = serde_json::from_str("\"07:30\"").unwrap();
        assert_eq!(back.minutes_since_midnight(), 450);
    }
}
