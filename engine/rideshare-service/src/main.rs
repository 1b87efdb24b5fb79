//! Rideshare Service
//!
//! Entry point for the simulator, the matcher, or both in one process.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use rideshare_service::{
    graceful_shutdown, initialize_logging_with_config, load_config, setup_signal_handlers, Scenario,
    ServiceMode, ServiceState,
};

#[derive(Parser)]
#[command(name = "rideshare", version, about = "Station rideshare simulation")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tick loop against the configured collaborators
    Simulator,
    /// Consume candidate events and create matches
    Matcher,
    /// Run simulator and matcher in one process with in-memory collaborators
    Standalone {
        /// Scenario JSON file; a built-in demo is used when omitted
        #[arg(long)]
        scenario: Option<PathBuf>,

        /// Run this many ticks without delay, print a summary and exit
        #[arg(long)]
        ticks: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    initialize_logging_with_config(&config.logging)?;
    info!("Starting Rideshare Service v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Simulator => {
            let state = Arc::new(ServiceState::new(config).await?);
            let clock = spawn_clock(&state);
            wait_for_shutdown(state, vec![("SimulationClock", clock)]).await?;
        }
        Command::Matcher => {
            let state = Arc::new(ServiceState::new(config).await?);
            let consumer = spawn_consumer(&state);
            wait_for_shutdown(state, vec![("Matching consumer", consumer)]).await?;
        }
        Command::Standalone { scenario, ticks } => {
            config.service.mode = ServiceMode::Standalone;
            let scenario = match scenario.or_else(|| config.service.scenario_file.clone()) {
                Some(path) => Scenario::from_file(&path)?,
                None => Scenario::demo(),
            };
            let state = Arc::new(ServiceState::standalone(config, &scenario).await?);

            if let Some(ticks) = ticks {
                state.run_ticks(ticks).await?;
                state.log_summary().await;
                return Ok(());
            }

            let clock = spawn_clock(&state);
            let consumer = spawn_consumer(&state);
            wait_for_shutdown(state, vec![("SimulationClock", clock), ("Matching consumer", consumer)]).await?;
        }
    }

    info!("Rideshare Service shutdown complete");
    Ok(())
}

fn spawn_clock(state: &Arc<ServiceState>) -> tokio::task::JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = state.start_simulation_clock().await {
            error!("SimulationClock failed: {:#}", e);
        }
    })
}

fn spawn_consumer(state: &Arc<ServiceState>) -> tokio::task::JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move { state.start_matching_consumer().await })
}

async fn wait_for_shutdown(
    state: Arc<ServiceState>,
    handles: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
) -> Result<()> {
    let shutdown_signal = setup_signal_handlers()?;
    info!("Rideshare Service is running. Press Ctrl+C to shutdown gracefully.");
    let _ = shutdown_signal.await;

    info!("Shutdown signal received. Initiating graceful shutdown...");
    graceful_shutdown(state, handles).await;
    Ok(())
}
