//! Service configuration management
//!
//! Assembled once at startup: built-in defaults, then an optional TOML file, then
//! `RIDESHARE_*` environment variables. Nested keys use a double underscore, e.g.
//! `RIDESHARE_CLOCK__TICK_CADENCE_MS=1000`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use match_queue::QueueConfig;
use matching_coordinator::CoordinatorConfig;
use service_clients::ClientConfig;
use simulation_clock::ClockConfig;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "RIDESHARE";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// SimulationClock configuration
    pub clock: ClockConfig,

    /// Matching coordinator configuration
    pub coordinator: CoordinatorConfig,

    /// Candidate queue configuration
    pub queue: QueueConfig,

    /// Collaborator service endpoints
    pub clients: ClientConfig,

    /// Driver store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Service-level configuration
    pub service: ServiceSettings,
}

/// Where collaborators and state live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Everything in process, nothing persisted
    Standalone,
    /// Redis store and queue, HTTP collaborators
    Remote,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub mode: ServiceMode,

    /// Scenario seeded into the in-memory world in standalone mode
    pub scenario_file: Option<PathBuf>,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Driver store settings for remote mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub redis_url: String,

    /// Prefix of every key the store writes
    pub key_prefix: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,

    pub ansi: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { mode: ServiceMode::Standalone, scenario_file: None, shutdown_timeout_secs: 10 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { redis_url: "redis://127.0.0.1:6379".to_string(), key_prefix: "rideshare".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string(), ansi: true }
    }
}

/// Load configuration from an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let mut config: ServiceConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    load_from_env(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Short-form overrides kept for convenience in scripts
fn load_from_env(config: &mut ServiceConfig) {
    if let Ok(level) = std::env::var("RIDESHARE_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Ok(format) = std::env::var("RIDESHARE_LOG_FORMAT") {
        config.logging.format = format;
    }

    if let Ok(url) = std::env::var("RIDESHARE_REDIS_URL") {
        config.store.redis_url = url.clone();
        config.queue.redis_url = url;
    }
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    config.clock.validate().map_err(|e| anyhow::anyhow!("Invalid clock configuration: {}", e))?;
    config
        .coordinator
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid coordinator configuration: {}", e))?;

    if config.service.mode == ServiceMode::Remote {
        config.clients.validate().map_err(|e| anyhow::anyhow!("Invalid client configuration: {}", e))?;
        if config.queue.queue_name.is_empty() {
            return Err(anyhow::anyhow!("Queue name must not be empty"));
        }
    }

    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    Ok(())
}

/// Save configuration to a TOML file
pub fn save_config(config: &ServiceConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write configuration to {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.service.mode, ServiceMode::Standalone);
        assert_eq!(config.queue.queue_name, "matching_queue");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[clock]\ntick_cadence_ms = 500\n\n[coordinator]\neligibility_window_minutes = 10\n\n[logging]\nformat = \"json\"\n"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.clock.tick_cadence_ms, 500);
        assert_eq!(config.clock.wait_ticks, 5);
        assert_eq!(config.coordinator.eligibility_window_minutes, 10);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ServiceConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = ServiceConfig::default();
        config.clock.tick_cadence_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ServiceConfig::default();
        config.service.mode = ServiceMode::Remote;
        config.clients.trip_service_url = "trips:8006".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rideshare.toml");
        let mut config = ServiceConfig::default();
        config.clock.tick_cadence_ms = 1234;
        config.service.mode = ServiceMode::Remote;
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.clock.tick_cadence_ms, 1234);
        assert_eq!(loaded.service.mode, ServiceMode::Remote);
    }

    #[test]
    fn missing_file_is_an_error() {
        tokio_test::assert_err!(load_config(Some(Path::new("/nonexistent/rideshare.toml"))));
    }
}
