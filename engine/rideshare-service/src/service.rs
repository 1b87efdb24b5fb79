//! Service state management and component initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{ServiceConfig, ServiceMode};
use crate::scenario::Scenario;
use driver_route::{DriverStore, InMemoryDriverStore, RedisDriverStore};
use match_queue::{CandidateQueue, InMemoryCandidateQueue, RedisCandidateQueue};
use matching_coordinator::{CoordinatorStats, MatchingConsumer, MatchingCoordinator};
use service_clients::{Collaborators, InMemoryCollaborators, LocalRouteCommands, RouteCommands};
use simulation_clock::{ClockCollaborators, SimulationClock, TickReport};

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    pub store: Arc<dyn DriverStore>,
    pub queue: Arc<dyn CandidateQueue>,
    pub services: Collaborators,

    /// In-memory world, present in standalone mode
    pub world: Option<Arc<InMemoryCollaborators>>,

    pub simulation_clock: Arc<SimulationClock>,
    pub matching_consumer: Arc<MatchingConsumer>,

    shutdown_tx: watch::Sender<bool>,
}

impl ServiceState {
    /// Create the service for the configured mode
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        match config.service.mode {
            ServiceMode::Standalone => {
                let scenario = match &config.service.scenario_file {
                    Some(path) => Scenario::from_file(path)?,
                    None => Scenario::demo(),
                };
                Self::standalone(config, &scenario).await
            }
            ServiceMode::Remote => Self::remote(config).await,
        }
    }

    /// Everything in process, seeded from `scenario`
    pub async fn standalone(config: ServiceConfig, scenario: &Scenario) -> Result<Self> {
        info!("Initializing standalone components...");

        let world = Arc::new(InMemoryCollaborators::new());
        let store: Arc<dyn DriverStore> = Arc::new(InMemoryDriverStore::new());
        let queue: Arc<dyn CandidateQueue> = Arc::new(InMemoryCandidateQueue::new(config.queue.queue_name.clone()));

        scenario.seed(&world, store.as_ref()).await.context("Failed to seed scenario")?;

        let routes: Arc<dyn RouteCommands> = Arc::new(LocalRouteCommands::new(store.clone()));
        let services = Collaborators::in_memory(world.clone(), routes);

        Self::assemble(config, store, queue, services, Some(world))
    }

    /// Redis store and queue with HTTP collaborators
    pub async fn remote(config: ServiceConfig) -> Result<Self> {
        info!("Initializing remote components...");

        info!("Connecting driver store at {}...", config.store.redis_url);
        let store: Arc<dyn DriverStore> = Arc::new(
            RedisDriverStore::new(&config.store.redis_url, config.store.key_prefix.clone())
                .await
                .context("Failed to connect driver store")?,
        );

        info!("Connecting candidate queue '{}'...", config.queue.queue_name);
        let queue: Arc<dyn CandidateQueue> = Arc::new(RedisCandidateQueue::connect_with_retry(&config.queue).await);

        let routes: Arc<dyn RouteCommands> = Arc::new(LocalRouteCommands::new(store.clone()));
        let services =
            Collaborators::http(config.clients.clone(), routes).context("Failed to create HTTP collaborators")?;

        Self::assemble(config, store, queue, services, None)
    }

    fn assemble(
        config: ServiceConfig,
        store: Arc<dyn DriverStore>,
        queue: Arc<dyn CandidateQueue>,
        services: Collaborators,
        world: Option<Arc<InMemoryCollaborators>>,
    ) -> Result<Self> {
        info!("Initializing SimulationClock...");
        let collaborators = ClockCollaborators::from_services(store.clone(), queue.clone(), &services);
        let simulation_clock = Arc::new(
            SimulationClock::new(collaborators, config.clock.clone()).context("Failed to create SimulationClock")?,
        );

        info!("Initializing MatchingCoordinator...");
        let coordinator = Arc::new(MatchingCoordinator::new(services.clone(), config.coordinator.clone()));
        let matching_consumer = Arc::new(MatchingConsumer::new(coordinator, queue.clone()));

        let (shutdown_tx, _) = watch::channel(false);

        info!("Service components initialized successfully");
        Ok(Self {
            config,
            store,
            queue,
            services,
            world,
            simulation_clock,
            matching_consumer,
            shutdown_tx,
        })
    }

    /// Run the clock loop until stopped
    pub async fn start_simulation_clock(&self) -> Result<()> {
        info!("Starting SimulationClock...");
        self.simulation_clock.run_clock_loop().await.context("SimulationClock failed")?;
        info!("SimulationClock stopped");
        Ok(())
    }

    pub fn stop_simulation_clock(&self) {
        info!("Stopping SimulationClock...");
        self.simulation_clock.stop();
    }

    /// Run the matching consumer until shutdown
    pub async fn start_matching_consumer(&self) {
        info!("Starting matching consumer...");
        self.matching_consumer.run(self.shutdown_tx.subscribe()).await;
    }

    /// Run `ticks` ticks back to back, matching the candidates of each tick before the next
    pub async fn run_ticks(&self, ticks: u64) -> Result<Vec<TickReport>> {
        let mut reports = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            let report = self.simulation_clock.run_tick().await.context("Tick failed")?;
            let matched = self.matching_consumer.process_pending().await;
            info!(
                tick = report.tick,
                drivers = report.drivers_processed,
                published = report.candidates_published,
                events_processed = matched,
                "Tick finished"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    pub fn matching_stats(&self) -> CoordinatorStats {
        self.matching_consumer.coordinator().stats()
    }

    /// Whether the clock loop is running
    pub fn is_running(&self) -> bool {
        self.simulation_clock.is_running()
    }

    /// Signal every component to stop
    pub fn shutdown(&self) {
        info!("Initiating shutdown...");
        self.stop_simulation_clock();
        // Consumers started later still observe the flag
        self.shutdown_tx.send_replace(true);
    }

    /// Log the in-memory world, when there is one
    pub async fn log_summary(&self) {
        let active = match self.store.list_active().await {
            Ok(drivers) => drivers.len(),
            Err(e) => {
                error!("Failed to list drivers: {}", e);
                0
            }
        };
        let stats = self.matching_stats();
        info!(
            active_drivers = active,
            events = stats.processed,
            matched = stats.matched,
            no_riders = stats.no_riders,
            partial = stats.partial,
            "Service summary"
        );

        if let Some(world) = &self.world {
            for trip in world.trips() {
                info!(
                    trip_id = %trip.id,
                    driver_id = %trip.driver_id,
                    rider_id = %trip.rider_id,
                    status = %trip.status,
                    "Trip"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rideshare_types::TripStatus;

    fn fast_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.clock.tick_cadence_ms = 5;
        config.coordinator.idle_poll_ms = 5;
        config
    }

    #[tokio::test]
    async fn demo_scenario_matches_and_completes_a_trip() {
        let state = ServiceState::standalone(fast_config(), &Scenario::demo()).await.unwrap();
        let world = state.world.clone().unwrap();

        // Enough ticks to reach the station, wait there and finish the route
        let reports = state.run_ticks(25).await.unwrap();
        assert!(reports.iter().any(|r| r.candidates_published > 0));
        assert_eq!(state.matching_stats().matched, 1);

        let trips = world.trips();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].status, TripStatus::Completed);
        assert!(state.store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_clock_and_consumer() {
        let state = Arc::new(ServiceState::standalone(fast_config(), &Scenario::default()).await.unwrap());

        let clock = {
            let state = state.clone();
            tokio::spawn(async move { state.start_simulation_clock().await })
        };
        let consumer = {
            let state = state.clone();
            tokio::spawn(async move { state.start_matching_consumer().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        state.shutdown();

        let timeout = std::time::Duration::from_secs(1);
        tokio::time::timeout(timeout, clock).await.unwrap().unwrap().unwrap();
        tokio::time::timeout(timeout, consumer).await.unwrap().unwrap();
        assert!(!state.is_running());
    }
}
