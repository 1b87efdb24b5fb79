//! Configuration for SimulationClock

use crate::{DEFAULT_METRICS_INTERVAL_MS, DEFAULT_REMOTE_TIMEOUT_MS, DEFAULT_TICK_CADENCE_MS};
use geo_proximity::ProximityConfig;
use rideshare_types::WAIT_TICKS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the SimulationClock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Real time between ticks in milliseconds
    pub tick_cadence_ms: u64,

    /// Simulated minutes added to a moving driver's clock per tick
    pub minutes_per_tick: u32,

    /// Ticks a driver waits at a matched station before departing
    pub wait_ticks: u32,

    /// Timeout for each remote call in milliseconds
    pub remote_timeout_ms: u64,

    /// Metrics emission interval in milliseconds
    pub metrics_interval_ms: u64,

    /// Driver-to-station proximity settings
    pub proximity: ProximityConfig,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_cadence_ms: DEFAULT_TICK_CADENCE_MS,
            minutes_per_tick: 1,
            wait_ticks: WAIT_TICKS,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            metrics_interval_ms: DEFAULT_METRICS_INTERVAL_MS,
            proximity: ProximityConfig::default(),
        }
    }
}

impl ClockConfig {
    /// Get tick cadence as Duration
    pub fn tick_cadence(&self) -> Duration {
        Duration::from_millis(self.tick_cadence_ms)
    }

    /// Get remote call timeout as Duration
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    /// Get metrics interval as Duration
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tick_cadence_ms == 0 {
            return Err("tick_cadence_ms must be greater than 0".to_string());
        }
        if self.minutes_per_tick == 0 || self.minutes_per_tick >= 24 * 60 {
            return Err("minutes_per_tick must be between 1 and 1439".to_string());
        }
        if self.wait_ticks == 0 {
            return Err("wait_ticks must be greater than 0".to_string());
        }
        if self.remote_timeout_ms == 0 {
            return Err("remote_timeout_ms must be greater than 0".to_string());
        }
        if !(self.proximity.threshold_meters.is_finite() && self.proximity.threshold_meters > 0.0) {
            return Err("proximity.threshold_meters must be a positive number".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ClockConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
