//! Collaborator endpoints

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub station_service_url: String,
    pub rider_service_url: String,
    pub driver_service_url: String,
    pub matching_service_url: String,
    pub trip_service_url: String,
    pub notification_service_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Send route mutations to the driver service instead of the shared driver store
    pub route_commands_over_http: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            station_service_url: "http://localhost:8002".to_string(),
            rider_service_url: "http://localhost:8003".to_string(),
            driver_service_url: "http://localhost:8004".to_string(),
            matching_service_url: "http://localhost:8005".to_string(),
            trip_service_url: "http://localhost:8006".to_string(),
            notification_service_url: "http://localhost:8007".to_string(),
            request_timeout_ms: 3000,
            route_commands_over_http: false,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        let urls = [
            ("station_service_url", &self.station_service_url),
            ("rider_service_url", &self.rider_service_url),
            ("driver_service_url", &self.driver_service_url),
            ("matching_service_url", &self.matching_service_url),
            ("trip_service_url", &self.trip_service_url),
            ("notification_service_url", &self.notification_service_url),
        ];
        for (name, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
