use std::time::Duration;

use async_trait::async_trait;
use geo::LineString;
use geojson::de::deserialize_geometry;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use nav_session_types::ManeuverCategory;

use crate::config::SessionConfig;
use crate::error::RoutingError;
use crate::locale::{Locale, StepWords};
use crate::route::{ProviderManeuver, ProviderRoute, RouteRequest, RoutingProvider};

/// Routes through an OSRM server's HTTP API.
pub struct OsrmProvider {
    http: Client,
    base_url: String,
}

impl OsrmProvider {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> reqwest::Result<Self> {
        Self::new(&config.provider_url, config.request_timeout())
    }

    pub fn url(&self, request: &RouteRequest) -> String {
        let [from, to] = request.waypoints;
        format!(
            "{}/{}/{},{};{},{}?overview=full&geometries=geojson&steps=true",
            self.base_url, request.profile, from.lng, from.lat, to.lng, to.lat
        )
    }
}

#[async_trait]
impl RoutingProvider for OsrmProvider {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, RoutingError> {
        let url = self.url(request);
        debug!("GET {url}");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| RoutingError::Network(err.to_string()))?;

        // OSRM explains most failures in a JSON body, even on a 400
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| RoutingError::Network(err.to_string()))?;
        if !status.is_success() && serde_json::from_str::<serde_json::Value>(&body).is_err() {
            return Err(RoutingError::ProviderRejected(format!("HTTP {status}")));
        }
        parse_response(&body, Locale::from_tag(&request.language))
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    #[serde(deserialize_with = "deserialize_geometry")]
    geometry: LineString,
    distance: f64,
    duration: f64,
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
    #[serde(default)]
    bearing_after: f64,
    exit: Option<u32>,
}

/// Parses an OSRM route response, formatting instructions in the given locale. Only the first
/// route is used.
pub fn parse_response(body: &str, locale: Locale) -> Result<ProviderRoute, RoutingError> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|err| RoutingError::ProviderRejected(format!("unreadable response: {err}")))?;

    match response.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Err(RoutingError::NoRoute),
        code => {
            let message = response.message.unwrap_or_default();
            return Err(RoutingError::ProviderRejected(
                format!("{code} {message}").trim_end().to_string(),
            ));
        }
    }
    let Some(route) = response.routes.into_iter().next() else {
        return Err(RoutingError::NoRoute);
    };

    let num_legs = route.legs.len();
    let mut maneuvers = Vec::new();
    for (leg_idx, leg) in route.legs.into_iter().enumerate() {
        let last_leg = leg_idx + 1 == num_legs;
        for step in leg.steps {
            let category = categorize(&step.maneuver, last_leg);
            let direction = compass(step.maneuver.bearing_after);
            let text = locale.instruction(
                category,
                &StepWords {
                    road: &step.name,
                    direction,
                    modifier: step.maneuver.modifier.as_deref(),
                    exit: step.maneuver.exit,
                },
            );
            maneuvers.push(ProviderManeuver {
                text,
                distance_meters: step.distance,
                time_seconds: step.duration,
                direction: direction.to_string(),
                kind: category.name().to_string(),
            });
        }
    }

    Ok(ProviderRoute {
        total_distance_meters: route.distance,
        total_time_seconds: route.duration,
        polyline: route.geometry,
        maneuvers,
    })
}

fn categorize(maneuver: &OsrmManeuver, last_leg: bool) -> ManeuverCategory {
    match maneuver.kind.as_str() {
        "depart" => ManeuverCategory::Head,
        "arrive" if last_leg => ManeuverCategory::DestinationReached,
        "arrive" => ManeuverCategory::WaypointReached,
        "roundabout" | "rotary" => ManeuverCategory::Roundabout,
        "merge" => ManeuverCategory::Merge,
        "on ramp" => ManeuverCategory::OnRamp,
        "off ramp" => ManeuverCategory::OffRamp,
        "fork" => ManeuverCategory::Fork,
        "end of road" => ManeuverCategory::EndOfRoad,
        // turn, new name, continue, notification, and anything newer
        _ => match maneuver.modifier.as_deref() {
            Some("straight") | None => ManeuverCategory::Straight,
            Some("slight right") => ManeuverCategory::SlightRight,
            Some("right") => ManeuverCategory::Right,
            Some("sharp right") => ManeuverCategory::SharpRight,
            Some("uturn") => ManeuverCategory::TurnAround,
            Some("sharp left") => ManeuverCategory::SharpLeft,
            Some("left") => ManeuverCategory::Left,
            Some("slight left") => ManeuverCategory::SlightLeft,
            Some(_) => ManeuverCategory::Other,
        },
    }
}

/// 8-point compass abbreviation for a bearing in degrees
fn compass(bearing: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let idx = ((bearing.rem_euclid(360.0) + 22.5) / 45.0).floor() as usize % 8;
    POINTS[idx]
}
