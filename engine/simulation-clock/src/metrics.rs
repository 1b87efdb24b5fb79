//! Metrics collection for SimulationClock

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics collected by the SimulationClock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockMetrics {
    /// Current tick number
    pub current_tick: u64,

    /// Duration of the last tick in nanoseconds
    pub tick_duration_ns: u64,

    /// Average tick duration over the recent history in nanoseconds
    pub avg_tick_duration_ns: u64,

    /// Maximum tick duration in nanoseconds
    pub max_tick_duration_ns: u64,

    /// 95th percentile tick duration in nanoseconds
    pub p95_tick_duration_ns: u64,

    /// Drivers stepped in the last tick
    pub drivers_processed: u32,

    /// Driver failures in the last tick
    pub driver_failures: u32,

    /// System uptime in seconds
    pub system_uptime_seconds: u64,

    pub total_ticks_processed: u64,
    pub total_driver_failures: u64,
    pub total_candidates_published: u64,
    pub total_drivers_retired: u64,
    pub total_effect_failures: u64,

    /// Ticks that ran without a station directory
    pub ticks_without_directory: u64,
}

/// Metrics collector for the SimulationClock
pub struct MetricsCollector {
    // Tick metrics
    current_tick: AtomicU64,
    tick_durations: Vec<AtomicU64>,
    max_tick_duration: AtomicU64,
    total_ticks: AtomicU64,

    // Driver metrics
    drivers_processed: AtomicU64,
    driver_failures: AtomicU64,
    total_driver_failures: AtomicU64,
    total_published: AtomicU64,
    total_retired: AtomicU64,
    total_effect_failures: AtomicU64,
    ticks_without_directory: AtomicU64,

    // Timing
    start_time: Instant,

    history_size: usize,
}

impl MetricsCollector {
    /// Create a new metrics collector keeping `history_size` tick durations
    pub fn new(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        Self {
            current_tick: AtomicU64::new(0),
            tick_durations: (0..history_size).map(|_| AtomicU64::new(0)).collect(),
            max_tick_duration: AtomicU64::new(0),
            total_ticks: AtomicU64::new(0),
            drivers_processed: AtomicU64::new(0),
            driver_failures: AtomicU64::new(0),
            total_driver_failures: AtomicU64::new(0),
            total_published: AtomicU64::new(0),
            total_retired: AtomicU64::new(0),
            total_effect_failures: AtomicU64::new(0),
            ticks_without_directory: AtomicU64::new(0),
            start_time: Instant::now(),
            history_size,
        }
    }

    /// Record a completed tick
    pub fn record_tick(&self, tick: u64, duration: Duration, drivers_processed: u32, driver_failures: u32) {
        let duration_ns = duration.as_nanos() as u64;
        let index = (tick as usize) % self.history_size;

        self.current_tick.store(tick, Ordering::Relaxed);
        self.tick_durations[index].store(duration_ns, Ordering::Relaxed);
        self.total_ticks.fetch_add(1, Ordering::Relaxed);
        self.drivers_processed.store(drivers_processed as u64, Ordering::Relaxed);
        self.driver_failures.store(driver_failures as u64, Ordering::Relaxed);
        self.total_driver_failures.fetch_add(driver_failures as u64, Ordering::Relaxed);
        self.max_tick_duration.fetch_max(duration_ns, Ordering::Relaxed);
    }

    pub fn record_published(&self, count: u32) {
        self.total_published.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_retired(&self) {
        self.total_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_effect_failures(&self, count: u32) {
        self.total_effect_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_missing_directory(&self) {
        self.ticks_without_directory.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> ClockMetrics {
        let current_tick = self.current_tick.load(Ordering::Relaxed);
        let last_index = (current_tick as usize) % self.history_size;
        let tick_duration_ns = self.tick_durations[last_index].load(Ordering::Relaxed);

        let mut durations: Vec<u64> = self
            .tick_durations
            .iter()
            .map(|d| d.load(Ordering::Relaxed))
            .filter(|&d| d > 0)
            .collect();
        durations.sort_unstable();

        let (avg_tick_duration_ns, p95_tick_duration_ns) = if durations.is_empty() {
            (0, 0)
        } else {
            let avg = durations.iter().sum::<u64>() / durations.len() as u64;
            let index = (durations.len() as f64 * 0.95) as usize;
            (avg, durations[index.min(durations.len() - 1)])
        };

        ClockMetrics {
            current_tick,
            tick_duration_ns,
            avg_tick_duration_ns,
            max_tick_duration_ns: self.max_tick_duration.load(Ordering::Relaxed),
            p95_tick_duration_ns,
            drivers_processed: self.drivers_processed.load(Ordering::Relaxed) as u32,
            driver_failures: self.driver_failures.load(Ordering::Relaxed) as u32,
            system_uptime_seconds: self.start_time.elapsed().as_secs(),
            total_ticks_processed: self.total_ticks.load(Ordering::Relaxed),
            total_driver_failures: self.total_driver_failures.load(Ordering::Relaxed),
            total_candidates_published: self.total_published.load(Ordering::Relaxed),
            total_drivers_retired: self.total_retired.load(Ordering::Relaxed),
            total_effect_failures: self.total_effect_failures.load(Ordering::Relaxed),
            ticks_without_directory: self.ticks_without_directory.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.current_tick.store(0, Ordering::Relaxed);
        self.max_tick_duration.store(0, Ordering::Relaxed);
        self.total_ticks.store(0, Ordering::Relaxed);
        self.drivers_processed.store(0, Ordering::Relaxed);
        self.driver_failures.store(0, Ordering::Relaxed);
        self.total_driver_failures.store(0, Ordering::Relaxed);
        self.total_published.store(0, Ordering::Relaxed);
        self.total_retired.store(0, Ordering::Relaxed);
        self.total_effect_failures.store(0, Ordering::Relaxed);
        self.ticks_without_directory.store(0, Ordering::Relaxed);

        for duration in self.tick_durations.iter() {
            duration.store(0, Ordering::Relaxed);
        }
    }
}
