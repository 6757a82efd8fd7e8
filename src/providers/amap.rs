//! AMap (Gaode) routing adapter
//!
//! Geocodes both endpoints, then queries driving and transit routes concurrently.
//! One failing mode is dropped; only the failure of both fails the fetch.

use super::de::{lenient_object, lenient_string, meters, name_or_string, seconds_to_minutes};
use super::http::{HttpSettings, build_client, fetch_json, url_with_query};
use super::{ProviderError, ProviderResult, RouteOptions, RouteProvider};
use crate::config::RoutingConfig;
use crate::models::location::Location;
use crate::models::route::{format_distance_km, join_polylines};
use crate::models::{RouteStep, TransportMode, TravelOption};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const GEOCODE_PATH: &str = "/v3/geocode/geo";
const DRIVING_PATH: &str = "/v3/direction/driving";
const TRANSIT_PATH: &str = "/v3/direction/transit/integrated";

/// Routing provider backed by the AMap web service API
pub struct AmapRouteProvider {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl AmapRouteProvider {
    pub fn new(config: &RoutingConfig) -> ProviderResult<Self> {
        let settings = HttpSettings::new(config.timeout_seconds, config.max_retries);
        Ok(Self {
            client: build_client(&settings)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn api_key(&self) -> ProviderResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::Config("AMap API key is not configured".to_string()))
    }

    /// Resolve a free-text address to coordinates and an area code
    #[instrument(skip(self, cancel))]
    async fn geocode(&self, address: &str, cancel: &CancellationToken) -> ProviderResult<Location> {
        let url = url_with_query(
            &format!("{}{GEOCODE_PATH}", self.base_url),
            &[("key", self.api_key()?), ("address", address)],
        );
        let response: GeocodeResponse = fetch_json(self.client.get(url), cancel, "AMap geocode").await?;
        location_from(response, address)
    }

    async fn driving(
        &self,
        origin: &Location,
        destination: &Location,
        cancel: &CancellationToken,
    ) -> ProviderResult<TravelOption> {
        let url = url_with_query(
            &format!("{}{DRIVING_PATH}", self.base_url),
            &[
                ("key", self.api_key()?),
                ("origin", origin.to_lng_lat().as_str()),
                ("destination", destination.to_lng_lat().as_str()),
                ("extensions", "base"),
            ],
        );
        let response: DrivingResponse = fetch_json(self.client.get(url), cancel, "AMap driving").await?;
        driving_option_from(response)
    }

    async fn transit(
        &self,
        origin: &Location,
        destination: &Location,
        cancel: &CancellationToken,
    ) -> ProviderResult<TravelOption> {
        let city = destination.adcode.clone().unwrap_or_default();
        let url = url_with_query(
            &format!("{}{TRANSIT_PATH}", self.base_url),
            &[
                ("key", self.api_key()?),
                ("origin", origin.to_lng_lat().as_str()),
                ("destination", destination.to_lng_lat().as_str()),
                ("city", city.as_str()),
            ],
        );
        let response: TransitResponse = fetch_json(self.client.get(url), cancel, "AMap transit").await?;
        transit_option_from(response)
    }
}

#[async_trait]
impl RouteProvider for AmapRouteProvider {
    #[instrument(skip(self, cancel))]
    async fn fetch_routes(
        &self,
        origin: &str,
        destination: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<RouteOptions> {
        let (origin_loc, destination_loc) =
            tokio::join!(self.geocode(origin, cancel), self.geocode(destination, cancel));

        let origin_loc = origin_loc.map_err(|e| resolution_error("origin", origin, e))?;
        let destination_loc =
            destination_loc.map_err(|e| resolution_error("destination", destination, e))?;

        debug!(
            "Resolved {} -> {}, {} -> {}",
            origin,
            origin_loc.to_lng_lat(),
            destination,
            destination_loc.to_lng_lat()
        );

        let (driving, transit) = tokio::join!(
            self.driving(&origin_loc, &destination_loc, cancel),
            self.transit(&origin_loc, &destination_loc, cancel)
        );

        merge_modes(driving, transit)
    }
}

fn resolution_error(endpoint: &str, address: &str, cause: ProviderError) -> ProviderError {
    match cause {
        ProviderError::Cancelled | ProviderError::Config(_) => cause,
        other => ProviderError::NoResults(format!(
            "Could not resolve {endpoint} address '{address}': {other}"
        )),
    }
}

/// Keep every successful mode; fail only when none succeeded
fn merge_modes(
    driving: ProviderResult<TravelOption>,
    transit: ProviderResult<TravelOption>,
) -> ProviderResult<RouteOptions> {
    let mut options = RouteOptions::new();
    let mut failures = Vec::new();

    for (mode, result) in [
        (TransportMode::Driving, driving),
        (TransportMode::Transit, transit),
    ] {
        match result {
            Ok(option) => {
                options.insert(mode, option);
            }
            Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
            Err(e) => {
                warn!("{} route unavailable: {}", mode, e);
                failures.push(format!("{mode}: {e}"));
            }
        }
    }

    if options.is_empty() {
        return Err(ProviderError::NoResults(format!(
            "No route available ({})",
            failures.join("; ")
        )));
    }

    info!("Fetched {} route option(s)", options.len());
    Ok(options)
}

// --- response schemas ---

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default)]
    geocodes: Vec<Geocode>,
}

#[derive(Debug, Deserialize)]
struct Geocode {
    #[serde(default, deserialize_with = "lenient_string")]
    location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    adcode: String,
}

#[derive(Debug, Deserialize)]
struct DrivingResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default, deserialize_with = "lenient_object")]
    route: Option<DrivingRoute>,
}

#[derive(Debug, Deserialize)]
struct DrivingRoute {
    #[serde(default, deserialize_with = "lenient_string")]
    taxi_cost: String,
    #[serde(default)]
    paths: Vec<DrivingPath>,
}

#[derive(Debug, Deserialize)]
struct DrivingPath {
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration: String,
    #[serde(default)]
    steps: Vec<DrivingStep>,
}

#[derive(Debug, Deserialize)]
struct DrivingStep {
    #[serde(default, deserialize_with = "lenient_string")]
    instruction: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
}

#[derive(Debug, Deserialize)]
struct TransitResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    info: String,
    #[serde(default, deserialize_with = "lenient_object")]
    route: Option<TransitRoute>,
}

#[derive(Debug, Deserialize)]
struct TransitRoute {
    #[serde(default)]
    transits: Vec<Transit>,
}

#[derive(Debug, Deserialize)]
struct Transit {
    #[serde(default, deserialize_with = "lenient_string")]
    cost: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Deserialize)]
struct Segment {
    #[serde(default, deserialize_with = "lenient_object")]
    walking: Option<Walking>,
    #[serde(default, deserialize_with = "lenient_object")]
    bus: Option<Bus>,
}

#[derive(Debug, Deserialize)]
struct Walking {
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
    #[serde(default)]
    steps: Vec<WalkingStep>,
}

#[derive(Debug, Deserialize)]
struct WalkingStep {
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
}

impl Walking {
    /// Segment-level polyline, falling back to the joined step polylines
    fn path(&self) -> String {
        if self.polyline.trim().is_empty() {
            join_polylines(self.steps.iter().map(|s| s.polyline.as_str()))
        } else {
            self.polyline.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct Bus {
    #[serde(default)]
    buslines: Vec<BusLine>,
}

#[derive(Debug, Deserialize)]
struct BusLine {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "name_or_string")]
    departure_stop: String,
    #[serde(default, deserialize_with = "name_or_string")]
    arrival_stop: String,
    #[serde(default, deserialize_with = "lenient_string")]
    via_num: String,
    #[serde(default, deserialize_with = "lenient_string")]
    duration: String,
    #[serde(default, deserialize_with = "lenient_string")]
    distance: String,
    #[serde(default, deserialize_with = "lenient_string")]
    polyline: String,
}

// --- normalization ---

fn check_status(status: &str, info: &str, what: &str) -> ProviderResult<()> {
    if status == "1" {
        Ok(())
    } else {
        Err(ProviderError::NoResults(format!(
            "{what} request rejected (status {status}, info {info})"
        )))
    }
}

fn location_from(response: GeocodeResponse, address: &str) -> ProviderResult<Location> {
    check_status(&response.status, &response.info, "Geocode")?;

    let geocode = response
        .geocodes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoResults(format!("Address not found: {address}")))?;

    let (lng, lat) = Location::parse_lng_lat(&geocode.location).ok_or_else(|| {
        ProviderError::Malformed(format!("Invalid coordinates '{}'", geocode.location))
    })?;

    Ok(Location::with_adcode(lng, lat, address.to_string(), geocode.adcode))
}

fn driving_option_from(response: DrivingResponse) -> ProviderResult<TravelOption> {
    check_status(&response.status, &response.info, "Driving")?;

    let route = response
        .route
        .ok_or_else(|| ProviderError::Malformed("Driving response has no route".to_string()))?;
    let path = route
        .paths
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoResults("No driving path".to_string()))?;

    let polyline = join_polylines(path.steps.iter().map(|s| s.polyline.as_str()));
    let steps = path
        .steps
        .into_iter()
        .map(|s| RouteStep::new(s.instruction, seconds_to_minutes(&s.duration), meters(&s.distance)))
        .collect();

    Ok(TravelOption {
        mode: TransportMode::Driving,
        duration_min: seconds_to_minutes(&path.duration),
        distance_km: format_distance_km(u64::from(meters(&path.distance))),
        cost: route.taxi_cost,
        steps,
        polyline,
    })
}

fn transit_option_from(response: TransitResponse) -> ProviderResult<TravelOption> {
    check_status(&response.status, &response.info, "Transit")?;

    let transit = response
        .route
        .and_then(|r| r.transits.into_iter().next())
        .ok_or_else(|| ProviderError::NoResults("No transit plan".to_string()))?;

    let mut steps = Vec::new();
    let mut fragments = Vec::new();

    for segment in transit.segments {
        if let Some(walking) = segment.walking {
            fragments.push(walking.path());
            let distance = meters(&walking.distance);
            steps.push(RouteStep::new(
                format!("步行至车站 ({distance}米)"),
                seconds_to_minutes(&walking.duration),
                distance,
            ));
        }

        if let Some(line) = segment.bus.and_then(|b| b.buslines.into_iter().next()) {
            fragments.push(line.polyline.clone());
            steps.push(RouteStep::new(
                format!(
                    "乘坐 {}, 在 {} 上车, 经过 {} 站, 到 {} 下车",
                    line.name, line.departure_stop, line.via_num, line.arrival_stop
                ),
                seconds_to_minutes(&line.duration),
                meters(&line.distance),
            ));
        }
    }

    Ok(TravelOption {
        mode: TransportMode::Transit,
        duration_min: seconds_to_minutes(&transit.duration),
        distance_km: format_distance_km(u64::from(meters(&transit.distance))),
        cost: transit.cost,
        steps,
        polyline: join_polylines(fragments.iter().map(String::as_str)),
    })
}
