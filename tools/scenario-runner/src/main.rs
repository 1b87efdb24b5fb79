use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use rideshare_service::{Scenario, ScenarioDriver, ServiceConfig, ServiceState};
use rideshare_types::{DriverId, NotificationType, SimTime, TripStatus, UserId};

/// Fixture run end to end with the in-memory collaborators
struct Fixture {
    name: &'static str,
    scenario: Scenario,
    ticks: u64,
    expect_trips: usize,
    expect_completed: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("🚀 Starting Rideshare Scenario Runner");

    let mut failures = 0;
    for fixture in fixtures() {
        if !run_fixture(&fixture).await? {
            failures += 1;
        }
    }

    println!("\n📝 Summary:");
    if failures > 0 {
        bail!("{} scenario(s) failed", failures);
    }
    println!("   - All scenarios passed");
    Ok(())
}

fn fixtures() -> Vec<Fixture> {
    let demo = Scenario::demo();

    let mut no_riders = demo.clone();
    no_riders.ride_requests.clear();

    // Rider expected an hour after the driver passes
    let mut late_rider = demo.clone();
    late_rider.ride_requests[0].eta = SimTime::default().saturating_add(60);

    // Two drivers on the same route compete for a single rider
    let mut contested = demo.clone();
    let first = contested.drivers[0].clone();
    contested.drivers.push(ScenarioDriver { driver_id: DriverId(2), user_id: UserId(1002), ..first });

    vec![
        Fixture { name: "driver picks up waiting rider", scenario: demo, ticks: 25, expect_trips: 1, expect_completed: 1 },
        Fixture { name: "driver passes empty station", scenario: no_riders, ticks: 25, expect_trips: 0, expect_completed: 0 },
        Fixture { name: "rider outside eligibility window", scenario: late_rider, ticks: 25, expect_trips: 0, expect_completed: 0 },
        Fixture { name: "two drivers, one rider", scenario: contested, ticks: 25, expect_trips: 1, expect_completed: 1 },
    ]
}

async fn run_fixture(fixture: &Fixture) -> Result<bool> {
    println!("\n🧪 Scenario: {}", fixture.name);

    let state = ServiceState::standalone(ServiceConfig::default(), &fixture.scenario).await?;
    let reports = state.run_ticks(fixture.ticks).await?;

    let published: u32 = reports.iter().map(|r| r.candidates_published).sum();
    let retired: u32 = reports.iter().map(|r| r.drivers_retired).sum();
    let stats = state.matching_stats();
    println!(
        "   Ticks: {}, candidates published: {}, drivers retired: {}",
        reports.len(),
        published,
        retired
    );
    println!(
        "   Events: {} processed, {} matched, {} without riders, {} duplicates, {} partial",
        stats.processed, stats.matched, stats.no_riders, stats.duplicates, stats.partial
    );

    let Some(world) = state.world.clone() else {
        bail!("standalone service has no in-memory world");
    };

    for record in world.matches() {
        println!(
            "   Match {}: rider {} with driver {} at station {} ({})",
            record.id,
            record.rider_id,
            record.driver_id,
            record.station_id,
            record.timestamp
        );
    }

    let trips = world.trips();
    for trip in &trips {
        println!("   Trip {}: rider {} driver {} status {}", trip.id, trip.rider_id, trip.driver_id, trip.status);
    }

    let nearby = world
        .notifications()
        .iter()
        .filter(|n| n.kind == NotificationType::DriverNearby)
        .count();
    println!("   Notifications: {} total, {} driver-nearby", world.notifications().len(), nearby);

    let completed = trips.iter().filter(|t| t.status == TripStatus::Completed).count();
    let passed = trips.len() == fixture.expect_trips && completed == fixture.expect_completed;
    if passed {
        println!("   ✅ {} trip(s), {} completed", trips.len(), completed);
    } else {
        println!(
            "   ❌ expected {} trip(s) with {} completed, found {} with {} completed",
            fixture.expect_trips,
            fixture.expect_completed,
            trips.len(),
            completed
        );
    }
    Ok(passed)
}
