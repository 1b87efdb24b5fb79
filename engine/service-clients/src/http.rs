//! REST clients for the collaborator services

use crate::config::ClientConfig;
use crate::contracts::{
    MatchCreation, MatchRegistry, Notifier, RiderDemand, RouteCommands, RouteUpdate,
    StationDirectory, TripLifecycle,
};
use crate::error::{ClientError, Result};
use driver_route::PushOutcome;
use reqwest::{Client, Method, Response, StatusCode};
use rideshare_types::{
    DriverId, MatchId, MatchKey, MatchRecord, MatchStatus, NewRideRequest, NewTrip, Notification,
    RideRequest, RideRequestId, RideStatus, SimTime, Station, StationId, Trip, TripId, UserId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct StatusUpdate<S> {
    status: S,
}

#[derive(Serialize)]
struct CreateMatchBody {
    driver_id: DriverId,
    station_id: StationId,
    timestamp: SimTime,
    rider_id: UserId,
    ride_request_id: RideRequestId,
}

#[derive(Deserialize)]
struct RouteUpdateResponse {
    outcome: PushOutcome,
}

/// All collaborators reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpCollaborators {
    config: ClientConfig,
    client: Client,
}

impl HttpCollaborators {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { config, client })
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    /// Map non-success statuses onto `ClientError`
    async fn check(response: Response, entity: &'static str, id: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::not_found(entity, id));
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected(format!("{} {} returned {}: {}", entity, id, status, body)))
    }

    async fn request<B, T>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
        entity: &'static str,
        id: &str,
    ) -> Result<(StatusCode, T)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("{} {}", method, url);
        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = Self::check(builder.send().await?, entity, id).await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    async fn get<T: DeserializeOwned>(&self, url: String, entity: &'static str, id: &str) -> Result<T> {
        let (_, value) = self.request::<(), T>(Method::GET, url, None, entity, id).await?;
        Ok(value)
    }
}

#[async_trait::async_trait]
impl StationDirectory for HttpCollaborators {
    async fn list_stations(&self) -> Result<Vec<Station>> {
        let url = Self::url(&self.config.station_service_url, "/api/stations/");
        self.get(url, "stations", "*").await
    }
}

#[async_trait::async_trait]
impl RiderDemand for HttpCollaborators {
    async fn riders_by_station(&self, station_id: StationId, max_eta: SimTime) -> Result<Vec<RideRequest>> {
        let url = Self::url(&self.config.rider_service_url, "/api/rides/by_station/");
        let response = self
            .client
            .get(&url)
            .query(&[("station_id", station_id.to_string()), ("max_eta", max_eta.to_string())])
            .send()
            .await?;
        let response = Self::check(response, "station", &station_id.to_string()).await?;
        Ok(response.json().await?)
    }

    async fn get_ride_request(&self, id: RideRequestId) -> Result<RideRequest> {
        let url = Self::url(&self.config.rider_service_url, &format!("/api/rides/{}/", id));
        self.get(url, "ride request", &id.to_string()).await
    }

    async fn update_ride_status(&self, id: RideRequestId, status: RideStatus) -> Result<RideRequest> {
        let url = Self::url(&self.config.rider_service_url, &format!("/api/rides/{}/", id));
        let body = StatusUpdate { status };
        let (_, ride) = self.request(Method::PATCH, url, Some(&body), "ride request", &id.to_string()).await?;
        Ok(ride)
    }

    async fn create_ride_request(&self, request: NewRideRequest) -> Result<RideRequest> {
        let url = Self::url(&self.config.rider_service_url, "/api/rides/");
        let station = request.station_id.to_string();
        let (_, ride) = self.request(Method::POST, url, Some(&request), "station", &station).await?;
        Ok(ride)
    }
}

#[async_trait::async_trait]
impl RouteCommands for HttpCollaborators {
    async fn update_driver_route(&self, update: &RouteUpdate) -> Result<PushOutcome> {
        let url = Self::url(
            &self.config.driver_service_url,
            &format!("/api/drivers/{}/route/", update.driver_id),
        );
        let (_, response): (_, RouteUpdateResponse) = self
            .request(Method::POST, url, Some(update), "driver", &update.driver_id.to_string())
            .await?;
        Ok(response.outcome)
    }
}

#[async_trait::async_trait]
impl MatchRegistry for HttpCollaborators {
    async fn create_match(
        &self,
        key: MatchKey,
        rider_id: UserId,
        ride_request_id: RideRequestId,
    ) -> Result<MatchCreation> {
        let url = Self::url(&self.config.matching_service_url, "/api/matches/");
        let body = CreateMatchBody {
            driver_id: key.driver_id,
            station_id: key.station_id,
            timestamp: key.timestamp,
            rider_id,
            ride_request_id,
        };
        let (status, record): (_, MatchRecord) =
            self.request(Method::POST, url, Some(&body), "match", &key.to_string()).await?;
        if status == StatusCode::CREATED {
            Ok(MatchCreation::Created(record.id))
        } else {
            Ok(MatchCreation::Existing(record.id))
        }
    }

    async fn find_match(&self, key: &MatchKey) -> Result<Option<MatchRecord>> {
        let url = Self::url(&self.config.matching_service_url, "/api/matches/lookup/");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("driver_id", key.driver_id.to_string()),
                ("station_id", key.station_id.to_string()),
                ("timestamp", key.timestamp.to_string()),
            ])
            .send()
            .await?;
        match Self::check(response, "match", &key.to_string()).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(ClientError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_match_status(&self, id: MatchId, status: MatchStatus) -> Result<()> {
        let url = Self::url(&self.config.matching_service_url, &format!("/api/matches/{}/", id));
        let body = StatusUpdate { status };
        let (_, _record): (_, MatchRecord) =
            self.request(Method::PATCH, url, Some(&body), "match", &id.to_string()).await?;
        Ok(())
    }
}

impl HttpCollaborators {
    async fn trip_action(&self, id: TripId, action: &str) -> Result<Trip> {
        let url = Self::url(&self.config.trip_service_url, &format!("/api/trips/{}/{}/", id, action));
        let (_, trip) = self.request::<(), Trip>(Method::POST, url, None, "trip", &id.to_string()).await?;
        Ok(trip)
    }
}

#[async_trait::async_trait]
impl TripLifecycle for HttpCollaborators {
    async fn create_trip(&self, trip: NewTrip) -> Result<TripId> {
        let url = Self::url(&self.config.trip_service_url, "/api/trips/");
        let (_, created): (_, Trip) =
            self.request(Method::POST, url, Some(&trip), "match", &trip.match_id.to_string()).await?;
        Ok(created.id)
    }

    async fn start_trip(&self, id: TripId) -> Result<Trip> {
        self.trip_action(id, "start").await
    }

    async fn complete_trip(&self, id: TripId) -> Result<Trip> {
        self.trip_action(id, "complete").await
    }

    async fn cancel_trip(&self, id: TripId) -> Result<Trip> {
        self.trip_action(id, "cancel").await
    }

    async fn trips_by_driver(&self, driver_id: DriverId) -> Result<Vec<Trip>> {
        let url = Self::url(&self.config.trip_service_url, "/api/trips/by_driver/");
        let response = self.client.get(&url).query(&[("driver_id", driver_id.get())]).send().await?;
        let response = Self::check(response, "driver", &driver_id.to_string()).await?;
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl Notifier for HttpCollaborators {
    async fn send_notification(&self, notification: &Notification) -> Result<()> {
        let url = Self::url(&self.config.notification_service_url, "/api/notifications/");
        let response = self.client.post(&url).json(notification).send().await?;
        Self::check(response, "user", &notification.user_id.to_string()).await?;
        Ok(())
    }
}
