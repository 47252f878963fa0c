use nav_session_types::{CityId, Coordinate, Endpoint, Waypoint};

use crate::catalog::CityCatalog;

/// What an endpoint's picker currently shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum EndpointSelector {
    #[default]
    Unset,
    City(CityId),
    /// Use the coordinate last assigned by a map click or geolocation
    Manual,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct EndpointSlot {
    selector: EndpointSelector,
    manual: Option<Waypoint>,
}

/// Tracks which endpoint, if any, the next map click should assign, along with both endpoints'
/// current choices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionModeController {
    pending: Option<Endpoint>,
    // The temporary marker drawn where the user last clicked
    staged_marker: Option<Coordinate>,
    origin: EndpointSlot,
    destination: EndpointSlot,
}

impl SelectionModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<Endpoint> {
        self.pending
    }

    pub fn staged_marker(&self) -> Option<Coordinate> {
        self.staged_marker
    }

    /// Toggling the pending endpoint turns selection off; toggling the other one switches to it.
    /// Either way, any staged marker is discarded. Returns the new pending endpoint.
    pub fn toggle(&mut self, endpoint: Endpoint) -> Option<Endpoint> {
        self.pending = if self.pending == Some(endpoint) {
            None
        } else {
            Some(endpoint)
        };
        self.staged_marker = None;
        self.pending
    }

    /// Assigns the clicked point to the pending endpoint and leaves selection mode in one step.
    /// Returns the endpoint that changed. Does nothing if no endpoint is pending.
    pub fn on_map_click(&mut self, pt: Coordinate) -> Option<Endpoint> {
        let endpoint = self.pending.take()?;
        self.staged_marker = Some(pt);
        self.assign_manual(endpoint, Waypoint::from(pt));
        Some(endpoint)
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.staged_marker = None;
    }

    pub fn assign_manual(&mut self, endpoint: Endpoint, waypt: Waypoint) {
        let slot = self.slot_mut(endpoint);
        slot.manual = Some(waypt);
        slot.selector = EndpointSelector::Manual;
    }

    pub fn select_city(&mut self, endpoint: Endpoint, id: CityId) {
        self.slot_mut(endpoint).selector = EndpointSelector::City(id);
    }

    /// Resets the picker. The last manual coordinate is kept, but no longer used.
    pub fn clear_endpoint(&mut self, endpoint: Endpoint) {
        self.slot_mut(endpoint).selector = EndpointSelector::Unset;
    }

    pub fn selector(&self, endpoint: Endpoint) -> &EndpointSelector {
        &self.slot(endpoint).selector
    }

    pub fn manual(&self, endpoint: Endpoint) -> Option<&Waypoint> {
        self.slot(endpoint).manual.as_ref()
    }

    /// The waypoint an endpoint currently stands for, if it's fully specified
    pub fn resolve(&self, endpoint: Endpoint, catalog: &CityCatalog) -> Option<Waypoint> {
        let slot = self.slot(endpoint);
        match &slot.selector {
            EndpointSelector::Unset => None,
            EndpointSelector::City(id) => catalog.waypoint(id),
            EndpointSelector::Manual => slot.manual.clone(),
        }
    }

    fn slot(&self, endpoint: Endpoint) -> &EndpointSlot {
        match endpoint {
            Endpoint::Origin => &self.origin,
            Endpoint::Destination => &self.destination,
        }
    }

    fn slot_mut(&mut self, endpoint: Endpoint) -> &mut EndpointSlot {
        match endpoint {
            Endpoint::Origin => &mut self.origin,
            Endpoint::Destination => &mut self.destination,
        }
    }
}
