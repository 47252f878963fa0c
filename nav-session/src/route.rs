use std::sync::Arc;

use async_trait::async_trait;
use geo::line_measures::LengthMeasurable;
use geo::{Haversine, LineString};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use nav_session_types::{Coordinate, Maneuver, ManeuverCategory, RouteResult, Waypoint};

use crate::error::RoutingError;

/// Identifies one call to `request_route`. Tokens only ever increase, so the latest one wins.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RequestToken(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct RouteRequest {
    pub token: RequestToken,
    pub waypoints: [Coordinate; 2],
    pub profile: String,
    pub language: String,
}

/// A route as the provider describes it, before normalization.
#[derive(Clone, Debug)]
pub struct ProviderRoute {
    pub total_distance_meters: f64,
    pub total_time_seconds: f64,
    pub polyline: LineString,
    pub maneuvers: Vec<ProviderManeuver>,
}

#[derive(Clone, Debug)]
pub struct ProviderManeuver {
    pub text: String,
    pub distance_meters: f64,
    pub time_seconds: f64,
    pub direction: String,
    /// Like "Right" or "Roundabout"
    pub kind: String,
}

#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn route(&self, request: &RouteRequest) -> Result<ProviderRoute, RoutingError>;

    /// Frees whatever the provider set up for a request. Called exactly once per request, after
    /// it settles or is superseded.
    fn release(&self, _token: RequestToken) {}
}

/// The provider-side resources of one request. Released exactly once, either explicitly or when
/// dropped.
struct ProviderHandle {
    provider: Arc<dyn RoutingProvider>,
    token: RequestToken,
    released: bool,
}

impl ProviderHandle {
    fn new(provider: Arc<dyn RoutingProvider>, token: RequestToken) -> Self {
        Self {
            provider,
            token,
            released: false,
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.provider.release(self.token);
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.release();
    }
}

struct InFlight {
    token: RequestToken,
    origin: Waypoint,
    destination: Waypoint,
    handle: ProviderHandle,
    cancel: CancellationToken,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        // Stop waiting on the provider; the handle releases itself right after
        self.cancel.cancel();
    }
}

struct Outcome {
    token: RequestToken,
    result: Result<ProviderRoute, RoutingError>,
}

/// The route line and endpoint markers of the current route, for the rendering layer.
#[derive(Clone, Debug)]
pub struct RouteOverlay {
    pub line: LineString,
    pub origin: Waypoint,
    pub destination: Waypoint,
}

impl RouteOverlay {
    pub fn length_meters(&self) -> f64 {
        self.line.length(&Haversine)
    }

    pub fn to_geojson(&self) -> FeatureCollection {
        let mut features = Vec::new();

        let mut line = Feature::from(Geometry::new(Value::from(&self.line)));
        line.set_property("type", "route");
        line.set_property("length_meters", self.length_meters());
        features.push(line);

        // Markers go last so they're drawn on top of the line
        for (style, waypt) in [("origin", &self.origin), ("destination", &self.destination)] {
            let pt = waypt.coordinate().to_point();
            let mut marker = Feature::from(Geometry::new(Value::from(&pt)));
            marker.set_property("type", style);
            if let Some(ref label) = waypt.label {
                marker.set_property("label", label.clone());
            }
            features.push(marker);
        }

        features.into_iter().collect()
    }
}

/// The result of the latest successful request, and the only thing allowed to draw on the map.
#[derive(Clone, Debug)]
pub struct AppliedRoute {
    pub token: RequestToken,
    pub route: Arc<RouteResult>,
    pub overlay: RouteOverlay,
}

impl AppliedRoute {
    pub fn is_between(&self, origin: &Waypoint, destination: &Waypoint) -> bool {
        self.overlay.origin.same_place(origin) && self.overlay.destination.same_place(destination)
    }
}

#[derive(Clone, Debug)]
pub enum RouteEvent {
    Ready {
        token: RequestToken,
        route: Arc<RouteResult>,
    },
    Failed {
        token: RequestToken,
        error: RoutingError,
    },
}

/// Owns the lifecycle of routing requests. Only the most recently issued request may ever change
/// the applied route; anything older is cancelled, and its result dropped if it still arrives.
pub struct RouteSessionController {
    provider: Arc<dyn RoutingProvider>,
    profile: String,
    language: String,

    last_token: RequestToken,
    in_flight: Option<InFlight>,
    applied: Option<AppliedRoute>,

    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
}

impl RouteSessionController {
    pub fn new(provider: Arc<dyn RoutingProvider>, profile: &str, language: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            provider,
            profile: profile.to_string(),
            language: language.to_string(),
            last_token: RequestToken(0),
            in_flight: None,
            applied: None,
            tx,
            rx,
        }
    }

    /// Starts a request and returns immediately. The result arrives through `next_outcome`.
    ///
    /// Must be called within a tokio runtime.
    pub fn request_route(&mut self, origin: Waypoint, destination: Waypoint) -> RequestToken {
        self.last_token = RequestToken(self.last_token.0 + 1);
        let token = self.last_token;

        if let Some(old) = self.in_flight.take() {
            debug!("Route request {:?} superseded by {:?}", old.token, token);
        }
        if let Some(ref applied) = self.applied {
            if !applied.is_between(&origin, &destination) {
                debug!("Dropping route {:?}, the waypoints changed", applied.token);
                self.applied = None;
            }
        }

        let request = RouteRequest {
            token,
            waypoints: [origin.coordinate(), destination.coordinate()],
            profile: self.profile.clone(),
            language: self.language.clone(),
        };
        info!(
            "Requesting route {:?} from ({}, {}) to ({}, {})",
            token, origin.lat, origin.lng, destination.lat, destination.lng
        );

        let cancel = CancellationToken::new();
        let provider = self.provider.clone();
        let tx = self.tx.clone();
        let cancelled = cancel.clone();
        tokio::spawn(async move {
            let mut call = tokio::spawn(async move { provider.route(&request).await });
            let result = tokio::select! {
                _ = cancelled.cancelled() => {
                    call.abort();
                    return;
                }
                joined = &mut call => joined.unwrap_or_else(|err| {
                    Err(RoutingError::Network(format!("routing task failed: {err}")))
                }),
            };
            // Fails only if the controller is gone, and then nobody cares
            let _ = tx.send(Outcome { token, result });
        });

        self.in_flight = Some(InFlight {
            token,
            origin,
            destination,
            handle: ProviderHandle::new(self.provider.clone(), token),
            cancel,
        });
        token
    }

    /// Waits for the pending request to settle. Returns None when nothing is pending. Results of
    /// superseded requests are skipped silently.
    pub async fn next_outcome(&mut self) -> Option<RouteEvent> {
        while self.in_flight.is_some() {
            let outcome = self.rx.recv().await?;
            if let Some(event) = self.apply(outcome) {
                return Some(event);
            }
        }
        None
    }

    fn apply(&mut self, outcome: Outcome) -> Option<RouteEvent> {
        let mut in_flight = match self.in_flight.take() {
            Some(x) if x.token == outcome.token => x,
            other => {
                debug!("Ignoring stale route result {:?}", outcome.token);
                self.in_flight = other;
                return None;
            }
        };
        in_flight.handle.release();
        let token = in_flight.token;

        match outcome.result {
            Ok(provider_route) => {
                let (route, line) = normalize(provider_route);
                let route = Arc::new(route);
                info!(
                    "Route {:?}: {:.0} m, {:.0} s, {} maneuvers",
                    token,
                    route.total_distance_meters,
                    route.total_time_seconds,
                    route.maneuvers.len()
                );
                self.applied = Some(AppliedRoute {
                    token,
                    route: route.clone(),
                    overlay: RouteOverlay {
                        line,
                        origin: in_flight.origin.clone(),
                        destination: in_flight.destination.clone(),
                    },
                });
                Some(RouteEvent::Ready { token, route })
            }
            Err(error) => {
                warn!("Route {:?} failed: {}", token, error);
                Some(RouteEvent::Failed { token, error })
            }
        }
    }

    /// Abandons the pending request and forgets the applied route.
    pub fn cancel(&mut self) {
        if let Some(old) = self.in_flight.take() {
            debug!("Route request {:?} cancelled", old.token);
        }
        self.applied = None;
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_token(&self) -> RequestToken {
        self.last_token
    }

    pub fn applied(&self) -> Option<&AppliedRoute> {
        self.applied.as_ref()
    }

    pub fn overlay(&self) -> Option<&RouteOverlay> {
        self.applied.as_ref().map(|x| &x.overlay)
    }
}

/// Turns a provider payload into an immutable RouteResult and the line to draw.
pub fn normalize(route: ProviderRoute) -> (RouteResult, LineString) {
    let maneuvers = route
        .maneuvers
        .into_iter()
        .map(|m| Maneuver {
            text: m.text.trim().to_string(),
            distance_meters: non_negative(m.distance_meters),
            time_seconds: non_negative(m.time_seconds),
            direction: m.direction,
            category: ManeuverCategory::from_provider(&m.kind),
        })
        .collect();
    (
        RouteResult {
            total_distance_meters: non_negative(route.total_distance_meters),
            total_time_seconds: non_negative(route.total_time_seconds),
            maneuvers,
        },
        route.polyline,
    )
}

fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        0.0
    }
}
