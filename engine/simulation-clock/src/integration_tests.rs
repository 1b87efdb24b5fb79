//! Clock tests against in-memory collaborators

use crate::*;
use driver_route::error::Result as StoreResult;
use driver_route::{DriverRoute, DriverStore, DriverStoreError, InMemoryDriverStore, RouteQueue, RouteState};
use match_queue::{CandidateQueue, InMemoryCandidateQueue};
use rideshare_types::{
    CandidateEvent, Coordinate, DriverId, MatchId, NewTrip, NotificationType, RideRequestId, SimTime,
    Station, StationId, TripStatus, UserId,
};
use service_clients::{FailurePoint, InMemoryCollaborators, TripLifecycle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    world: Arc<InMemoryCollaborators>,
    store: Arc<InMemoryDriverStore>,
    queue: Arc<InMemoryCandidateQueue>,
}

impl Harness {
    fn new(stations: Vec<Station>) -> Self {
        Self {
            world: Arc::new(InMemoryCollaborators::with_stations(stations)),
            store: Arc::new(InMemoryDriverStore::new()),
            queue: Arc::new(InMemoryCandidateQueue::new("matching_queue")),
        }
    }

    fn collaborators(&self, store: Arc<dyn DriverStore>) -> ClockCollaborators {
        ClockCollaborators {
            store,
            stations: self.world.clone(),
            queue: self.queue.clone(),
            trips: self.world.clone(),
            notifier: self.world.clone(),
        }
    }

    fn clock(&self) -> SimulationClock {
        self.clock_with_store(self.store.clone())
    }

    fn clock_with_store(&self, store: Arc<dyn DriverStore>) -> SimulationClock {
        let config = ClockConfig { tick_cadence_ms: 10, remote_timeout_ms: 500, ..Default::default() };
        SimulationClock::new(self.collaborators(store), config).unwrap()
    }

    async fn add_driver(&self, id: u64, points: &[(f64, f64)]) -> DriverId {
        let route = RouteQueue::from(points.iter().map(|(lat, lng)| Coordinate::new(*lat, *lng)).collect::<Vec<_>>());
        let driver = DriverRoute::new(DriverId(id), UserId(id + 100), route, 3, SimTime::default()).unwrap();
        let driver_id = self.store.register(driver).await.unwrap();
        self.store.start_simulation(driver_id).await.unwrap();
        driver_id
    }

    async fn drain(&self) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.queue.next(Duration::ZERO).await.unwrap() {
            events.push(event);
        }
        events
    }

    async fn scheduled_trip(&self, driver_id: DriverId, station_id: StationId) -> rideshare_types::TripId {
        self.world
            .create_trip(NewTrip {
                match_id: MatchId(1),
                ride_request_id: RideRequestId(1),
                rider_id: UserId(500),
                driver_id,
                driver_user_id: UserId(driver_id.get() + 100),
                pickup_station_id: station_id,
                destination: Coordinate::new(0.0, 0.005),
                scheduled_at: SimTime::default(),
            })
            .await
            .unwrap()
    }
}

fn station(id: u64, lat: f64, lng: f64) -> Station {
    Station { id: StationId(id), name: format!("Station {id}"), location: Coordinate::new(lat, lng) }
}

#[tokio::test]
async fn far_station_produces_no_candidates() {
    let harness = Harness::new(vec![station(1, 0.0, 0.002)]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001), (0.0, 0.002)]).await;
    let clock = harness.clock();

    for _ in 0..2 {
        let report = clock.run_tick().await.unwrap();
        assert_eq!(report.drivers_processed, 1);
        assert_eq!(report.candidates_published, 0);
    }

    assert!(harness.drain().await.is_empty());
    let driver = harness.store.load(driver_id).await.unwrap();
    assert_eq!(driver.position(), Coordinate::new(0.0, 0.001));
    assert_eq!(driver.sim_time().to_string(), "10:02");
}

#[tokio::test]
async fn nearby_station_publishes_one_candidate_and_notifies_driver() {
    let harness = Harness::new(vec![station(7, 0.0, 0.001)]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.0009), (0.0, 0.005)]).await;
    let clock = harness.clock();

    let report = clock.run_tick().await.unwrap();
    assert_eq!(report.candidates_published, 1);
    assert!(report.stations_available);

    let events = harness.drain().await;
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.driver_id, driver_id);
    assert_eq!(event.nearby_station_id, StationId(7));
    assert_eq!(event.timestamp.to_string(), "10:01");
    assert_eq!(event.free_seats, 3);
    assert_eq!(event.destination(), Coordinate::new(0.0, 0.005));

    let notes = harness.world.notifications_for(UserId(101));
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationType::DriverNearby);
    assert_eq!(clock.get_metrics().total_candidates_published, 1);
}

#[tokio::test]
async fn directory_outage_moves_drivers_without_publishing() {
    let harness = Harness::new(vec![station(7, 0.0, 0.001)]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.0009), (0.0, 0.005)]).await;
    harness.world.inject_failure(FailurePoint::ListStations);
    let clock = harness.clock();

    let report = clock.run_tick().await.unwrap();
    assert!(!report.stations_available);
    assert_eq!(report.driver_failures, 0);
    assert!(harness.drain().await.is_empty());
    assert_eq!(harness.store.load(driver_id).await.unwrap().position(), Coordinate::new(0.0, 0.0009));
    assert_eq!(clock.get_metrics().ticks_without_directory, 1);
}

#[tokio::test]
async fn waiting_driver_starts_trips_after_wait() {
    let harness = Harness::new(vec![]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001)]).await;
    let station_at = Coordinate::new(0.0, 0.0001);
    harness.store.push_front(driver_id, StationId(4), station_at).await.unwrap();
    let trip_id = harness.scheduled_trip(driver_id, StationId(4)).await;
    let clock = harness.clock();

    for _ in 0..4 {
        clock.run_tick().await.unwrap();
        let driver = harness.store.load(driver_id).await.unwrap();
        assert_eq!(driver.state(), RouteState::Waiting);
        assert_eq!(driver.position(), Coordinate::new(0.0, 0.0));
        assert_eq!(driver.sim_time(), SimTime::default());
        assert_eq!(harness.world.trip(trip_id).unwrap().status, TripStatus::Scheduled);
    }

    clock.run_tick().await.unwrap();
    let driver = harness.store.load(driver_id).await.unwrap();
    assert_eq!(driver.matched_station_id(), None);
    assert_eq!(driver.route().len(), 2);
    assert_eq!(driver.sim_time(), SimTime::default());
    assert_eq!(harness.world.trip(trip_id).unwrap().status, TripStatus::Active);
}

#[tokio::test]
async fn finished_driver_completes_trips_and_is_removed() {
    let harness = Harness::new(vec![]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0)]).await;
    let trip_id = harness.scheduled_trip(driver_id, StationId(4)).await;
    let clock = harness.clock();

    let first = clock.run_tick().await.unwrap();
    assert_eq!(first.drivers_retired, 0);

    let second = clock.run_tick().await.unwrap();
    assert_eq!(second.drivers_retired, 1);
    assert!(!harness.store.contains(driver_id));
    assert_eq!(harness.world.trip(trip_id).unwrap().status, TripStatus::Completed);

    let third = clock.run_tick().await.unwrap();
    assert_eq!(third.drivers_processed, 0);
    assert_eq!(clock.get_metrics().total_drivers_retired, 1);
}

/// Store whose saves fail for one driver
struct FailingSaves {
    inner: Arc<InMemoryDriverStore>,
    broken: DriverId,
}

#[async_trait::async_trait]
impl DriverStore for FailingSaves {
    async fn register(&self, driver: DriverRoute) -> StoreResult<DriverId> {
        self.inner.register(driver).await
    }

    async fn load(&self, driver_id: DriverId) -> StoreResult<DriverRoute> {
        self.inner.load(driver_id).await
    }

    async fn list_active(&self) -> StoreResult<Vec<DriverRoute>> {
        self.inner.list_active().await
    }

    async fn save(&self, driver: &DriverRoute) -> StoreResult<u64> {
        if driver.driver_id() == self.broken {
            return Err(DriverStoreError::NotFound(self.broken));
        }
        self.inner.save(driver).await
    }

    async fn delete(&self, driver_id: DriverId) -> StoreResult<()> {
        self.inner.delete(driver_id).await
    }
}

#[tokio::test]
async fn one_failing_driver_does_not_stop_the_tick() {
    let harness = Harness::new(vec![]);
    let broken = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001)]).await;
    let healthy = harness.add_driver(2, &[(1.0, 0.0), (1.0, 0.001)]).await;
    let store = Arc::new(FailingSaves { inner: harness.store.clone(), broken });
    let clock = harness.clock_with_store(store);

    let report = clock.run_tick().await.unwrap();
    assert_eq!(report.drivers_processed, 2);
    assert_eq!(report.driver_failures, 1);
    assert_eq!(harness.store.load(healthy).await.unwrap().position(), Coordinate::new(1.0, 0.001));
    assert_eq!(harness.store.load(broken).await.unwrap().position(), Coordinate::new(0.0, 0.0));
}

/// Store that applies a station push right after the clock lists drivers
struct PushDuringTick {
    inner: Arc<InMemoryDriverStore>,
    target: DriverId,
    pushed: AtomicBool,
}

#[async_trait::async_trait]
impl DriverStore for PushDuringTick {
    async fn register(&self, driver: DriverRoute) -> StoreResult<DriverId> {
        self.inner.register(driver).await
    }

    async fn load(&self, driver_id: DriverId) -> StoreResult<DriverRoute> {
        self.inner.load(driver_id).await
    }

    async fn list_active(&self) -> StoreResult<Vec<DriverRoute>> {
        let drivers = self.inner.list_active().await?;
        if !self.pushed.swap(true, Ordering::SeqCst) {
            self.inner.push_front(self.target, StationId(9), Coordinate::new(0.0, 0.0001)).await?;
        }
        Ok(drivers)
    }

    async fn save(&self, driver: &DriverRoute) -> StoreResult<u64> {
        self.inner.save(driver).await
    }

    async fn delete(&self, driver_id: DriverId) -> StoreResult<()> {
        self.inner.delete(driver_id).await
    }
}

#[tokio::test]
async fn concurrent_push_is_kept_and_driver_is_restepped() {
    let harness = Harness::new(vec![]);
    let driver_id = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001)]).await;
    let store = Arc::new(PushDuringTick { inner: harness.store.clone(), target: driver_id, pushed: AtomicBool::new(false) });
    let clock = harness.clock_with_store(store);

    let report = clock.run_tick().await.unwrap();
    assert_eq!(report.driver_failures, 0);

    let driver = harness.store.load(driver_id).await.unwrap();
    assert_eq!(driver.matched_station_id(), Some(StationId(9)));
    assert_eq!(driver.state(), RouteState::Waiting);
    assert_eq!(driver.wait_counter(), 1);
    assert_eq!(driver.position(), Coordinate::new(0.0, 0.0));
}

/// Store whose calls for one driver, or the listing, never complete
struct HangingStore {
    inner: Arc<InMemoryDriverStore>,
    stuck_driver: Option<DriverId>,
    stuck_listing: bool,
}

#[async_trait::async_trait]
impl DriverStore for HangingStore {
    async fn register(&self, driver: DriverRoute) -> StoreResult<DriverId> {
        self.inner.register(driver).await
    }

    async fn load(&self, driver_id: DriverId) -> StoreResult<DriverRoute> {
        self.inner.load(driver_id).await
    }

    async fn list_active(&self) -> StoreResult<Vec<DriverRoute>> {
        if self.stuck_listing {
            std::future::pending::<()>().await;
        }
        self.inner.list_active().await
    }

    async fn save(&self, driver: &DriverRoute) -> StoreResult<u64> {
        if Some(driver.driver_id()) == self.stuck_driver {
            std::future::pending::<()>().await;
        }
        self.inner.save(driver).await
    }

    async fn delete(&self, driver_id: DriverId) -> StoreResult<()> {
        self.inner.delete(driver_id).await
    }
}

#[tokio::test]
async fn stuck_driver_write_times_out_without_blocking_others() {
    let harness = Harness::new(vec![]);
    let stuck = harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001)]).await;
    let healthy = harness.add_driver(2, &[(1.0, 0.0), (1.0, 0.001)]).await;
    let store = Arc::new(HangingStore { inner: harness.store.clone(), stuck_driver: Some(stuck), stuck_listing: false });
    let clock = harness.clock_with_store(store);

    let report = tokio::time::timeout(Duration::from_secs(3), clock.run_tick())
        .await
        .expect("tick should finish within the store timeout")
        .unwrap();
    assert_eq!(report.drivers_processed, 2);
    assert_eq!(report.driver_failures, 1);
    assert_eq!(harness.store.load(healthy).await.unwrap().position(), Coordinate::new(1.0, 0.001));
    assert_eq!(harness.store.load(stuck).await.unwrap().position(), Coordinate::new(0.0, 0.0));
}

#[tokio::test]
async fn stuck_driver_listing_fails_the_tick_with_a_timeout() {
    let harness = Harness::new(vec![]);
    harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001)]).await;
    let store = Arc::new(HangingStore { inner: harness.store.clone(), stuck_driver: None, stuck_listing: true });
    let clock = harness.clock_with_store(store);

    let result = tokio::time::timeout(Duration::from_secs(3), clock.run_tick())
        .await
        .expect("tick should finish within the store timeout");
    assert!(matches!(result, Err(ClockError::StoreTimeout { operation: "list_active", .. })));
}

#[tokio::test]
async fn clock_loop_runs_until_stopped() {
    let harness = Harness::new(vec![]);
    harness.add_driver(1, &[(0.0, 0.0), (0.0, 0.001), (0.0, 0.002)]).await;
    let clock = Arc::new(harness.clock());

    let runner = clock.clone();
    let handle = tokio::spawn(async move { runner.run_clock_loop().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(clock.is_running());
    assert!(matches!(clock.run_clock_loop().await, Err(ClockError::ClockAlreadyRunning)));

    clock.stop();
    handle.await.unwrap().unwrap();
    assert!(!clock.is_running());
    assert!(clock.get_current_tick() >= 1);
}

#[test]
fn invalid_config_is_rejected() {
    let harness = Harness::new(vec![]);
    let config = ClockConfig { wait_ticks: 0, ..Default::default() };
    let result = SimulationClock::new(harness.collaborators(harness.store.clone()), config);
    assert!(matches!(result, Err(ClockError::Config(_))));
}
