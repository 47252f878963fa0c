use geo::{Distance, Haversine};

use nav_session_types::{City, CityId, Coordinate, Waypoint};

/// The fixed set of named points a user can pick as endpoints.
#[derive(Clone, Debug, Default)]
pub struct CityCatalog {
    cities: Vec<City>,
}

impl CityCatalog {
    pub fn new(cities: Vec<City>) -> Self {
        Self { cities }
    }

    /// Used when the graph backend isn't reachable
    pub fn default_branches() -> Self {
        let branch = |id: &str, name: &str, lat, lng| City {
            id: CityId(id.to_string()),
            name: name.to_string(),
            lat,
            lng,
        };
        Self::new(vec![
            branch("palermo", "Sucursal Palermo", -34.5713, -58.4233),
            branch("belgrano", "Sucursal Belgrano", -34.5620, -58.4584),
            branch("recoleta", "Sucursal Recoleta", -34.5889, -58.3960),
            branch("caballito", "Sucursal Caballito", -34.6187, -58.4438),
            branch("microcentro", "Sucursal Microcentro", -34.6037, -58.3816),
        ])
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn lookup(&self, id: &CityId) -> Option<&City> {
        self.cities.iter().find(|c| &c.id == id)
    }

    pub fn waypoint(&self, id: &CityId) -> Option<Waypoint> {
        self.lookup(id).map(City::to_waypoint)
    }

    /// The closest city to a point and its great-circle distance in meters
    pub fn nearest(&self, pt: Coordinate) -> Option<(&City, f64)> {
        let pt = pt.to_point();
        self.cities
            .iter()
            .map(|city| {
                let dist = Haversine.distance(pt, Coordinate::new(city.lat, city.lng).to_point());
                (city, dist)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
