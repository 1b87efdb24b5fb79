//! # Service Clients
//!
//! Contracts for the services the simulation core talks to, with two families of
//! implementations:
//!
//! - **HttpCollaborators**: REST clients with a per-request timeout
//! - **InMemoryCollaborators**: a process-local world enforcing the same rules
//!
//! Every call returns `Result<_, ClientError>`; transport failures, missing entities
//! and rejected transitions are distinct variants callers must handle.

pub mod config;
pub mod contracts;
pub mod error;
pub mod http;
pub mod local_route;
pub mod memory;

pub use config::ClientConfig;
pub use contracts::{
    notify_best_effort, with_timeout, MatchCreation, MatchRegistry, Notifier, RiderDemand,
    RouteAction, RouteCommands, RouteUpdate, StationDirectory, TripLifecycle,
};
pub use error::{ClientError, Result};
pub use http::HttpCollaborators;
pub use local_route::LocalRouteCommands;
pub use memory::{FailurePoint, InMemoryCollaborators};

use std::sync::Arc;

/// Handles to every collaborator, shared by the clock and the coordinator
#[derive(Clone)]
pub struct Collaborators {
    pub stations: Arc<dyn StationDirectory>,
    pub riders: Arc<dyn RiderDemand>,
    pub routes: Arc<dyn RouteCommands>,
    pub matches: Arc<dyn MatchRegistry>,
    pub trips: Arc<dyn TripLifecycle>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Every service backed by one in-memory world; routes go to `routes`
    pub fn in_memory(world: Arc<InMemoryCollaborators>, routes: Arc<dyn RouteCommands>) -> Self {
        Self {
            stations: world.clone(),
            riders: world.clone(),
            routes,
            matches: world.clone(),
            trips: world.clone(),
            notifier: world,
        }
    }

    /// Every service over HTTP; routes go to `routes` unless configured to use HTTP
    pub fn http(config: ClientConfig, routes: Arc<dyn RouteCommands>) -> Result<Self> {
        let over_http = config.route_commands_over_http;
        let client = Arc::new(HttpCollaborators::new(config)?);
        let routes: Arc<dyn RouteCommands> =
            if over_http { client.clone() as Arc<dyn RouteCommands> } else { routes };
        Ok(Self {
            stations: client.clone(),
            riders: client.clone(),
            routes,
            matches: client.clone(),
            trips: client.clone(),
            notifier: client,
        })
    }
}
