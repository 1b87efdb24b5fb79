//! # SimulationClock
//!
//! The heartbeat of the rideshare simulation. Each tick advances every active driver's
//! route state machine by exactly one step and turns the resulting effects into calls on
//! the collaborator services.
//!
//! Ticks are single-threaded and sequential: the station directory is fetched once per
//! tick and shared by every driver, drivers are processed one at a time in id order, and
//! a failure in one driver is logged without aborting the tick for the others.

pub mod clock;
pub mod config;
pub mod effects;
pub mod error;
pub mod metrics;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod integration_tests;

pub use clock::{ClockCollaborators, SimulationClock, TickReport};
pub use config::ClockConfig;
pub use effects::{EffectExecutor, EffectReport};
pub use error::ClockError;
pub use metrics::{ClockMetrics, MetricsCollector};

/// Current version of the SimulationClock
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tick cadence (one simulated minute every 3 seconds)
pub const DEFAULT_TICK_CADENCE_MS: u64 = 3000;

/// Default bound on every remote call made during a tick
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 3000;

/// Default metrics emission interval
pub const DEFAULT_METRICS_INTERVAL_MS: u64 = 30_000;
