use std::sync::Arc;

use geojson::FeatureCollection;
use log::{debug, info};

use nav_session_types::{CityId, Coordinate, Endpoint, Maneuver, RouteResult, Waypoint};

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod locale;
pub mod narrator;
pub mod navigation;
pub mod osrm;
pub mod route;
pub mod selection;

pub use backend::{GraphBackend, KnapsackItem};
pub use catalog::CityCatalog;
pub use config::{GeolocationConfig, NarrationConfig, SessionConfig};
pub use error::{
    BackendError, CatalogError, ConfigError, GeoError, NarrationError, NavigationError,
    RoutingError,
};
pub use geolocation::{GeolocationAcquirer, PositionOptions, PositionSource};
pub use locale::Locale;
pub use narrator::{
    Narration, NarrationOutcome, SpeechEngine, Utterance, UtteranceId, Voice, VoiceNarrator,
};
pub use navigation::NavigationStateMachine;
pub use osrm::OsrmProvider;
pub use route::{
    AppliedRoute, ProviderManeuver, ProviderRoute, RequestToken, RouteEvent, RouteOverlay,
    RouteRequest, RouteSessionController, RoutingProvider,
};
pub use selection::{EndpointSelector, SelectionModeController};

#[cfg(test)]
mod tests;

#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// The latest request succeeded. If the step wasn't reset, the user stays where they were.
    RouteReady {
        route: Arc<RouteResult>,
        step_reset: bool,
    },
    /// The latest request failed. Whatever was shown before stays.
    RouteFailed(RoutingError),
}

/// One user's navigation session: picking endpoints, fetching the route between them, and following
/// it step by step with optional voice narration.
pub struct NavigationSession {
    config: SessionConfig,
    catalog: CityCatalog,
    selection: SelectionModeController,
    routing: RouteSessionController,
    nav: NavigationStateMachine,
    narrator: VoiceNarrator,
    geolocation: GeolocationAcquirer,
}

impl NavigationSession {
    pub fn new(
        config: SessionConfig,
        catalog: CityCatalog,
        provider: Arc<dyn RoutingProvider>,
        engine: Arc<dyn SpeechEngine>,
        position: Option<Arc<dyn PositionSource>>,
    ) -> Self {
        let routing = RouteSessionController::new(provider, &config.profile, &config.language);
        let narrator = VoiceNarrator::new(engine, config.narration.clone(), &config.language);
        let geolocation =
            GeolocationAcquirer::new(position, PositionOptions::from(&config.geolocation));
        Self {
            config,
            catalog,
            selection: SelectionModeController::new(),
            routing,
            nav: NavigationStateMachine::new(),
            narrator,
            geolocation,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionModeController {
        &self.selection
    }

    pub fn routing(&self) -> &RouteSessionController {
        &self.routing
    }

    pub fn navigation(&self) -> &NavigationStateMachine {
        &self.nav
    }

    pub fn narrator(&self) -> &VoiceNarrator {
        &self.narrator
    }

    /// Clone this to query the device position without holding on to the session.
    pub fn geolocation(&self) -> &GeolocationAcquirer {
        &self.geolocation
    }

    // Endpoints

    /// Returns the token of the route request this caused, if any.
    pub fn select_city(
        &mut self,
        endpoint: Endpoint,
        id: CityId,
    ) -> Result<Option<RequestToken>, CatalogError> {
        if self.catalog.lookup(&id).is_none() {
            return Err(CatalogError::UnknownCity(id.0));
        }
        self.selection.select_city(endpoint, id);
        Ok(self.endpoints_changed())
    }

    /// Drops the current route, even when routing is manual.
    pub fn clear_endpoint(&mut self, endpoint: Endpoint) {
        self.selection.clear_endpoint(endpoint);
        // With an endpoint unset this never issues a request
        self.refresh_route();
    }

    pub fn toggle_selection(&mut self, endpoint: Endpoint) -> Option<Endpoint> {
        self.selection.toggle(endpoint)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Does nothing unless an endpoint is waiting for a click.
    pub fn on_map_click(&mut self, pt: Coordinate) -> Option<RequestToken> {
        let endpoint = self.selection.on_map_click(pt)?;
        debug!("Map click assigned {:?}", endpoint);
        self.endpoints_changed()
    }

    /// Asks the device for its position and makes that the origin. Leaves the origin alone on
    /// failure. Returns Ok(None) if no request was issued, like after `shutdown`.
    pub async fn locate_origin(&mut self) -> Result<Option<RequestToken>, GeoError> {
        match self.geolocation.acquire().await {
            Some(result) => self.apply_located_origin(result),
            None => Ok(None),
        }
    }

    /// For callers that ran `GeolocationAcquirer::acquire` themselves.
    pub fn apply_located_origin(
        &mut self,
        result: Result<Coordinate, GeoError>,
    ) -> Result<Option<RequestToken>, GeoError> {
        let pt = result?;
        self.selection.assign_manual(Endpoint::Origin, Waypoint::from(pt));
        Ok(self.endpoints_changed())
    }

    pub fn resolve(&self, endpoint: Endpoint) -> Option<Waypoint> {
        self.selection.resolve(endpoint, &self.catalog)
    }

    fn endpoints_changed(&mut self) -> Option<RequestToken> {
        if self.config.auto_route {
            self.refresh_route()
        } else {
            None
        }
    }

    // Routing

    /// Requests the route between the current endpoints. If either one is missing, the current
    /// route is dropped instead.
    pub fn refresh_route(&mut self) -> Option<RequestToken> {
        let (Some(origin), Some(destination)) =
            (self.resolve(Endpoint::Origin), self.resolve(Endpoint::Destination))
        else {
            if self.routing.applied().is_some() || self.routing.is_pending() {
                info!("An endpoint is missing, dropping the route");
            }
            self.routing.cancel();
            self.forget_route();
            return None;
        };

        let same_pair = self
            .routing
            .applied()
            .map_or(false, |applied| applied.is_between(&origin, &destination));
        if !same_pair {
            self.forget_route();
        }
        Some(self.routing.request_route(origin, destination))
    }

    fn forget_route(&mut self) {
        self.nav.clear();
        self.narrator.stop();
    }

    /// Waits for the pending route request to settle and applies the result. Returns None when
    /// nothing is pending.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.routing.next_outcome().await? {
            RouteEvent::Ready { route, .. } => {
                let step_reset = self.nav.on_new_route(route.clone());
                if step_reset {
                    self.speak_current();
                }
                Some(SessionEvent::RouteReady { route, step_reset })
            }
            RouteEvent::Failed { error, .. } => Some(SessionEvent::RouteFailed(error)),
        }
    }

    pub fn route(&self) -> Option<&Arc<RouteResult>> {
        self.nav.route()
    }

    /// The route line and endpoint markers to draw, if there's a route
    pub fn overlay_geojson(&self) -> Option<FeatureCollection> {
        self.routing.overlay().map(RouteOverlay::to_geojson)
    }

    // Step navigation

    pub fn current_maneuver(&self) -> Result<&Maneuver, NavigationError> {
        self.nav.current_maneuver()
    }

    /// Returns true if the step changed, in which case the new one is narrated.
    pub fn advance(&mut self) -> bool {
        self.after_move(|nav| nav.advance())
    }

    pub fn retreat(&mut self) -> bool {
        self.after_move(|nav| nav.retreat())
    }

    pub fn restart(&mut self) -> bool {
        self.after_move(|nav| nav.reset())
    }

    fn after_move(&mut self, f: impl FnOnce(&mut NavigationStateMachine) -> bool) -> bool {
        let changed = f(&mut self.nav);
        if changed {
            self.speak_current();
        }
        changed
    }

    // Narration

    /// Turning the voice on speaks the current step. Nothing interrupted earlier resumes.
    pub fn set_voice_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<Option<Narration>, NarrationError> {
        self.narrator.set_enabled(enabled)?;
        Ok(if enabled { self.speak_current() } else { None })
    }

    pub fn speak_current(&self) -> Option<Narration> {
        let maneuver = self.nav.current_maneuver().ok()?;
        self.narrator.speak(&self.narrator.announce(maneuver))
    }

    /// Reads out the whole route, from the intro to the arrival.
    pub fn narrate_route(&self) -> Option<Narration> {
        let route = self.nav.route()?;
        self.narrator.speak_sequence(&route.maneuvers)
    }

    /// Stops everything in flight. Late geolocation results are discarded from now on.
    pub fn shutdown(&mut self) {
        self.geolocation.teardown();
        self.narrator.stop();
        self.routing.cancel();
        self.nav.clear();
    }
}
