//! Rideshare Service Library
//!
//! Process bootstrap for the station rideshare simulation: configuration loading,
//! logging, component wiring for standalone and remote modes, scenario seeding, and
//! graceful shutdown.

pub mod config;
pub mod logging;
pub mod scenario;
pub mod service;
pub mod signals;

pub use config::{load_config, ServiceConfig, ServiceMode};
pub use logging::{initialize_logging, initialize_logging_with_config};
pub use scenario::{Scenario, ScenarioDriver, SeedSummary};
pub use service::ServiceState;
pub use signals::{graceful_shutdown, setup_signal_handlers};
