//! # Matching Coordinator
//!
//! Turns candidate events from the simulator into matches. For each event the
//! coordinator finds the earliest waiting rider at the station, sends the driver to the
//! station, marks the rider matched, and records the match and its scheduled trip.
//!
//! ## Ordering
//!
//! The route mutation is issued first and gates everything downstream: if it fails,
//! no rider, match or trip state is touched. Writes after it are independent remote
//! calls with no compensation. A failure there is reported as a
//! [`MatchError::PartialMatch`] carrying every identifier needed to reconcile by hand.
//! Match and trip creation are idempotent on the event's `(driver, station, timestamp)`
//! key, so a redelivered event never creates duplicates.

pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod error;


pub use config::CoordinatorConfig;
pub use consumer::MatchingConsumer;
pub use coordinator::{CoordinatorStats, MatchOutcome, MatchingCoordinator};
pub use error::{MatchError, MatchStage, PartialMatchFailure};
