//! Core SimulationClock implementation

use crate::config::ClockConfig;
use crate::effects::{EffectExecutor, EffectReport};
use crate::error::ClockError;
use crate::metrics::{ClockMetrics, MetricsCollector};
use driver_route::{DriverRoute, DriverStore, DriverStoreError, StepContext, StepOutcome};
use geo_proximity::ProximityDetector;
use match_queue::{CandidatePublisher, CandidateQueue};
use rideshare_types::Station;
use service_clients::{with_timeout, Collaborators, Notifier, StationDirectory, TripLifecycle};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Services the clock talks to
#[derive(Clone)]
pub struct ClockCollaborators {
    pub store: Arc<dyn DriverStore>,
    pub stations: Arc<dyn StationDirectory>,
    pub queue: Arc<dyn CandidateQueue>,
    pub trips: Arc<dyn TripLifecycle>,
    pub notifier: Arc<dyn Notifier>,
}

impl ClockCollaborators {
    pub fn from_services(
        store: Arc<dyn DriverStore>,
        queue: Arc<dyn CandidateQueue>,
        services: &Collaborators,
    ) -> Self {
        Self {
            store,
            stations: services.stations.clone(),
            queue,
            trips: services.trips.clone(),
            notifier: services.notifier.clone(),
        }
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub drivers_processed: u32,
    pub driver_failures: u32,
    pub candidates_published: u32,
    pub drivers_retired: u32,
    /// False when the station directory could not be fetched this tick
    pub stations_available: bool,
}

/// The main SimulationClock that drives every active driver
pub struct SimulationClock {
    config: ClockConfig,
    store: Arc<dyn DriverStore>,
    stations: Arc<dyn StationDirectory>,
    detector: ProximityDetector,
    effects: EffectExecutor,

    // State management
    current_tick: AtomicU64,
    is_running: AtomicBool,
    shutdown: Notify,

    metrics: Arc<MetricsCollector>,
}

impl SimulationClock {
    /// Create a new SimulationClock
    pub fn new(collaborators: ClockCollaborators, config: ClockConfig) -> Result<Self, ClockError> {
        config.validate().map_err(ClockError::Config)?;

        let publisher = CandidatePublisher::new(collaborators.queue);
        let effects = EffectExecutor::new(
            publisher,
            collaborators.trips,
            collaborators.notifier,
            config.remote_timeout(),
        );

        Ok(Self {
            detector: ProximityDetector::new(config.proximity.clone()),
            store: collaborators.store,
            stations: collaborators.stations,
            effects,
            current_tick: AtomicU64::new(0),
            is_running: AtomicBool::new(false),
            shutdown: Notify::new(),
            metrics: Arc::new(MetricsCollector::new(1000)),
            config,
        })
    }

    /// Start the main clock loop. Returns once `stop` has been called.
    pub async fn run_clock_loop(&self) -> Result<(), ClockError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(ClockError::ClockAlreadyRunning);
        }

        info!(
            cadence_ms = self.config.tick_cadence_ms,
            threshold_m = self.detector.threshold_meters(),
            "Starting SimulationClock main loop"
        );

        let mut last_metrics_emission = Instant::now();

        while self.is_running.load(Ordering::Relaxed) {
            let tick_start = Instant::now();

            // A failed tick is logged and the loop carries on
            match self.run_tick().await {
                Ok(report) => {
                    debug!(
                        tick = report.tick,
                        drivers = report.drivers_processed,
                        failures = report.driver_failures,
                        published = report.candidates_published,
                        "Tick complete"
                    );
                }
                Err(e) => error!("Tick failed: {}", e),
            }

            if last_metrics_emission.elapsed() >= self.config.metrics_interval() {
                self.emit_metrics();
                last_metrics_emission = Instant::now();
            }

            self.wait_for_next_tick(tick_start).await;
        }

        info!("SimulationClock main loop stopped");
        Ok(())
    }

    /// Stop the SimulationClock after the tick in progress
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Run a single tick: step every active driver once, in id order.
    ///
    /// Only a failure to enumerate drivers fails the tick; per-driver failures are
    /// counted in the report.
    pub async fn run_tick(&self) -> Result<TickReport, ClockError> {
        let tick_start = Instant::now();
        let tick = self.current_tick.fetch_add(1, Ordering::SeqCst);
        let mut report = TickReport { tick, ..Default::default() };

        let stations = self.fetch_stations(tick).await;
        report.stations_available = stations.is_some();
        if stations.is_none() {
            self.metrics.record_missing_directory();
        }

        let drivers = self.store_call("list_active", self.store.list_active()).await?;

        let mut ctx = StepContext::new(stations.as_deref(), &self.detector);
        ctx.wait_ticks = self.config.wait_ticks;
        ctx.minutes_per_tick = self.config.minutes_per_tick;

        for driver in drivers {
            let driver_id = driver.driver_id();
            report.drivers_processed += 1;
            match self.process_driver(driver, &ctx).await {
                Ok(Some((outcome, effects))) => {
                    report.candidates_published += effects.published;
                    if outcome.retired() {
                        report.drivers_retired += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    report.driver_failures += 1;
                    error!(driver_id = %driver_id, tick, "Failed to advance driver: {}", e);
                }
            }
        }

        self.metrics.record_tick(
            tick,
            tick_start.elapsed(),
            report.drivers_processed,
            report.driver_failures,
        );
        Ok(report)
    }

    async fn fetch_stations(&self, tick: u64) -> Option<Vec<Station>> {
        match with_timeout("list_stations", self.config.remote_timeout(), self.stations.list_stations()).await {
            Ok(stations) => Some(stations),
            Err(e) => {
                warn!(tick, "Station directory unavailable, skipping proximity checks: {}", e);
                None
            }
        }
    }

    /// Step and persist one driver, then run its effects.
    ///
    /// Effects only run after the new state is saved. A version conflict means a
    /// command landed between listing and saving; the driver is reloaded and stepped
    /// again once. Returns `None` when the driver vanished or stopped in the meantime.
    async fn process_driver(
        &self,
        mut driver: DriverRoute,
        ctx: &StepContext<'_>,
    ) -> Result<Option<(StepOutcome, EffectReport)>, ClockError> {
        let driver_id = driver.driver_id();
        let mut outcome = driver.step(ctx);

        match self.store_call("save", self.store.save(&driver)).await {
            Ok(_) => {}
            Err(ClockError::Store(e)) if e.is_conflict() => {
                debug!(driver_id = %driver_id, "Driver changed during tick, re-stepping");
                driver = match self.store_call("load", self.store.load(driver_id)).await {
                    Ok(fresh) => fresh,
                    Err(ClockError::Store(DriverStoreError::NotFound(_))) => return Ok(None),
                    Err(e) => return Err(e),
                };
                if !driver.is_simulating() {
                    return Ok(None);
                }
                outcome = driver.step(ctx);
                self.store_call("save", self.store.save(&driver)).await?;
            }
            Err(e) => return Err(e),
        }

        let effects = self.effects.execute(&outcome.effects).await;
        self.metrics.record_published(effects.published);
        if effects.failures > 0 {
            self.metrics.record_effect_failures(effects.failures);
        }

        if outcome.retired() {
            self.store_call("delete", self.store.delete(driver_id)).await?;
            self.metrics.record_retired();
            info!(driver_id = %driver_id, "Driver finished its route and was retired");
        }

        Ok(Some((outcome, effects)))
    }

    /// Bound a driver store call by the remote timeout
    async fn store_call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ClockError>
    where
        F: Future<Output = Result<T, DriverStoreError>>,
    {
        let timeout = self.config.remote_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ClockError::StoreTimeout { operation, timeout_ms: timeout.as_millis() as u64 }),
        }
    }

    async fn wait_for_next_tick(&self, tick_start: Instant) {
        let remaining = self.config.tick_cadence().saturating_sub(tick_start.elapsed());
        if remaining.is_zero() || !self.is_running.load(Ordering::Relaxed) {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = self.shutdown.notified() => {}
        }
    }

    fn emit_metrics(&self) {
        let metrics = self.metrics.get_metrics();
        debug!(
            tick = metrics.current_tick,
            avg_tick_us = metrics.avg_tick_duration_ns / 1_000,
            p95_tick_us = metrics.p95_tick_duration_ns / 1_000,
            drivers = metrics.drivers_processed,
            published = metrics.total_candidates_published,
            retired = metrics.total_drivers_retired,
            failures = metrics.total_driver_failures,
            "SimulationClock metrics"
        );
    }

    /// Number of ticks started so far
    pub fn get_current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn get_metrics(&self) -> ClockMetrics {
        self.metrics.get_metrics()
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn tick_cadence(&self) -> Duration {
        self.config.tick_cadence()
    }
}
