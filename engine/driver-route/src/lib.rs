//! # Driver Route
//!
//! The per-driver route state machine and the storage of driver aggregates.
//!
//! ## Core Components
//!
//! - **RouteQueue**: Ordered FIFO of waypoints, optionally tagged with a station
//! - **DriverRoute**: The driver aggregate and its once-per-tick `step`
//! - **RouteEffect**: Outbound side effects produced by a step, executed elsewhere
//! - **DriverStore**: Async storage contract with in-memory and Redis backends
//!
//! ## State machine
//!
//! ```text
//! MOVING --(push_front)--> WAITING --(wait_ticks elapsed)--> MOVING --(route empty)--> COMPLETE
//! ```
//!
//! `push_front` is the only mutation that comes from outside the tick loop. It is
//! idempotent for the station already waiting at the head of the route.

pub mod driver;
pub mod error;
pub mod route;
pub mod store;

pub use driver::{DriverRoute, PushOutcome, RouteEffect, RouteState, StepContext, StepOutcome};
pub use error::{DriverStoreError, RouteError};
pub use route::{RouteQueue, Waypoint};
pub use store::{modify_driver, DriverStore, InMemoryDriverStore, RedisDriverStore};
