//! Executes the side effects produced by driver steps
//!
//! Every remote call is bounded by the configured timeout. Failures are logged and
//! counted; they never flow back into the route state machine.

use driver_route::RouteEffect;
use match_queue::CandidatePublisher;
use rideshare_types::{DriverId, TripStatus};
use service_clients::{notify_best_effort, with_timeout, Notifier, TripLifecycle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What one batch of effects achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectReport {
    pub published: u32,
    pub trips_started: u32,
    pub trips_completed: u32,
    pub notifications: u32,
    pub failures: u32,
}

pub struct EffectExecutor {
    publisher: CandidatePublisher,
    trips: Arc<dyn TripLifecycle>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl EffectExecutor {
    pub fn new(
        publisher: CandidatePublisher,
        trips: Arc<dyn TripLifecycle>,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
    ) -> Self {
        Self { publisher, trips, notifier, timeout }
    }

    pub fn publisher(&self) -> &CandidatePublisher {
        &self.publisher
    }

    /// Run effects in order. `Retire` is left to the caller, which owns the driver store.
    pub async fn execute(&self, effects: &[RouteEffect]) -> EffectReport {
        let mut report = EffectReport::default();
        for effect in effects {
            match effect {
                RouteEffect::PublishCandidate(event) => {
                    let publish = async { self.publisher.publish(event).await.map_err(|e| e.to_string()) };
                    match tokio::time::timeout(self.timeout, publish).await {
                        Ok(Ok(())) => report.published += 1,
                        Ok(Err(_)) => report.failures += 1,
                        Err(_) => {
                            warn!(driver_id = %event.driver_id, "Candidate publish timed out");
                            report.failures += 1;
                        }
                    }
                }
                RouteEffect::StartTrips { driver_id } => {
                    self.transition_trips(*driver_id, TripAction::Start, &mut report).await;
                }
                RouteEffect::CompleteTrips { driver_id } => {
                    self.transition_trips(*driver_id, TripAction::Complete, &mut report).await;
                }
                RouteEffect::Notify(notification) => {
                    if notify_best_effort(self.notifier.as_ref(), notification.clone(), self.timeout).await {
                        report.notifications += 1;
                    } else {
                        report.failures += 1;
                    }
                }
                RouteEffect::Retire { .. } => {}
            }
        }
        report
    }

    async fn transition_trips(&self, driver_id: DriverId, action: TripAction, report: &mut EffectReport) {
        let trips = match with_timeout("trips_by_driver", self.timeout, self.trips.trips_by_driver(driver_id)).await
        {
            Ok(trips) => trips,
            Err(e) => {
                warn!(driver_id = %driver_id, "Could not list trips to {}: {}", action.verb(), e);
                report.failures += 1;
                return;
            }
        };

        for trip in trips.into_iter().filter(|t| action.applies_to(t.status)) {
            let result = match action {
                TripAction::Start => with_timeout("start_trip", self.timeout, self.trips.start_trip(trip.id)).await,
                TripAction::Complete => {
                    with_timeout("complete_trip", self.timeout, self.trips.complete_trip(trip.id)).await
                }
            };
            match result {
                Ok(updated) => {
                    info!(driver_id = %driver_id, trip_id = %trip.id, "Trip is now {}", updated.status);
                    match action {
                        TripAction::Start => report.trips_started += 1,
                        TripAction::Complete => report.trips_completed += 1,
                    }
                }
                Err(e) => {
                    warn!(driver_id = %driver_id, trip_id = %trip.id, "Failed to {} trip: {}", action.verb(), e);
                    report.failures += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TripAction {
    Start,
    Complete,
}

impl TripAction {
    fn applies_to(self, status: TripStatus) -> bool {
        match self {
            TripAction::Start => status == TripStatus::Scheduled,
            TripAction::Complete => !status.is_terminal(),
        }
    }

    fn verb(self) -> &'static str {
        match self {
            TripAction::Start => "start",
            TripAction::Complete => "complete",
        }
    }
}
