use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

/// A bare latitude/longitude pair, in degrees.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn to_point(self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

// geo uses x = longitude, y = latitude
impl From<Coord> for Coordinate {
    fn from(c: Coord) -> Self {
        Self { lat: c.y, lng: c.x }
    }
}

impl From<Coordinate> for Coord {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lng, y: c.lat }
    }
}

/// A routing endpoint. Produced by a city lookup, a map click or geolocation, and never modified
/// afterwards; a new choice makes a new Waypoint.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Waypoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            label: None,
        }
    }

    pub fn labeled(lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            label: Some(label.into()),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }

    /// Labels don't matter for routing, only the coordinates.
    pub fn same_place(&self, other: &Waypoint) -> bool {
        self.coordinate() == other.coordinate()
    }
}

impl From<Coordinate> for Waypoint {
    fn from(c: Coordinate) -> Self {
        Waypoint::new(c.lat, c.lng)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Origin,
    Destination,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum ManeuverCategory {
    Head,
    Straight,
    SlightRight,
    Right,
    SharpRight,
    TurnAround,
    SharpLeft,
    Left,
    SlightLeft,
    Roundabout,
    Fork,
    Merge,
    OnRamp,
    OffRamp,
    EndOfRoad,
    WaypointReached,
    DestinationReached,
    Other,
}

impl ManeuverCategory {
    /// Parses the maneuver type names used by Leaflet Routing Machine style providers. Unknown
    /// names aren't an error.
    pub fn from_provider(name: &str) -> ManeuverCategory {
        match name {
            "Head" => ManeuverCategory::Head,
            "Straight" | "Continue" => ManeuverCategory::Straight,
            "SlightRight" => ManeuverCategory::SlightRight,
            "Right" => ManeuverCategory::Right,
            "SharpRight" => ManeuverCategory::SharpRight,
            "TurnAround" | "UTurn" => ManeuverCategory::TurnAround,
            "SharpLeft" => ManeuverCategory::SharpLeft,
            "Left" => ManeuverCategory::Left,
            "SlightLeft" => ManeuverCategory::SlightLeft,
            "Roundabout" => ManeuverCategory::Roundabout,
            "Fork" => ManeuverCategory::Fork,
            "Merge" => ManeuverCategory::Merge,
            "OnRamp" => ManeuverCategory::OnRamp,
            "OffRamp" => ManeuverCategory::OffRamp,
            "EndOfRoad" => ManeuverCategory::EndOfRoad,
            "WaypointReached" => ManeuverCategory::WaypointReached,
            "DestinationReached" => ManeuverCategory::DestinationReached,
            _ => ManeuverCategory::Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ManeuverCategory::Head => "Head",
            ManeuverCategory::Straight => "Straight",
            ManeuverCategory::SlightRight => "SlightRight",
            ManeuverCategory::Right => "Right",
            ManeuverCategory::SharpRight => "SharpRight",
            ManeuverCategory::TurnAround => "TurnAround",
            ManeuverCategory::SharpLeft => "SharpLeft",
            ManeuverCategory::Left => "Left",
            ManeuverCategory::SlightLeft => "SlightLeft",
            ManeuverCategory::Roundabout => "Roundabout",
            ManeuverCategory::Fork => "Fork",
            ManeuverCategory::Merge => "Merge",
            ManeuverCategory::OnRamp => "OnRamp",
            ManeuverCategory::OffRamp => "OffRamp",
            ManeuverCategory::EndOfRoad => "EndOfRoad",
            ManeuverCategory::WaypointReached => "WaypointReached",
            ManeuverCategory::DestinationReached => "DestinationReached",
            ManeuverCategory::Other => "Other",
        }
    }

    /// A short glyph for list displays.
    pub fn icon(self) -> &'static str {
        match self {
            ManeuverCategory::WaypointReached | ManeuverCategory::DestinationReached => "🎯",
            ManeuverCategory::Head => "🚀",
            ManeuverCategory::SlightRight
            | ManeuverCategory::Right
            | ManeuverCategory::SharpRight => "➡️",
            ManeuverCategory::SlightLeft | ManeuverCategory::Left | ManeuverCategory::SharpLeft => {
                "⬅️"
            }
            ManeuverCategory::Straight => "⬆️",
            ManeuverCategory::TurnAround => "↩️",
            _ => "▶️",
        }
    }
}

/// One turn-by-turn instruction.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Maneuver {
    pub text: String,
    pub distance_meters: f64,
    pub time_seconds: f64,
    /// Compass heading when leaving the maneuver point, like "N" or "SW". Empty if unknown.
    pub direction: String,
    pub category: ManeuverCategory,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct RouteResult {
    pub total_distance_meters: f64,
    pub total_time_seconds: f64,
    pub maneuvers: Vec<Maneuver>,
}

impl RouteResult {
    pub fn maneuver(&self, idx: usize) -> Option<&Maneuver> {
        self.maneuvers.get(idx)
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_meters / 1000.0
    }

    pub fn total_minutes(&self) -> f64 {
        (self.total_time_seconds / 60.0).round()
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CityId(pub String);

/// A node from the graph backend's city catalog.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct City {
    pub id: CityId,
    #[serde(alias = "nombre")]
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl City {
    pub fn to_waypoint(&self) -> Waypoint {
        Waypoint::labeled(self.lat, self.lng, self.name.clone())
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct GraphEdge {
    #[serde(alias = "origenId")]
    pub from: CityId,
    #[serde(alias = "destinoId")]
    pub to: CityId,
    #[serde(alias = "distanciaKm")]
    pub distance_km: f64,
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// An ordered path between two cities
    Path,
    /// The visiting order of a graph traversal
    Traversal,
    /// A spanning tree; only the edges carry meaning
    Tree,
}

/// Every graph backend answer, whatever shape the endpoint used, normalized into one variant.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct AlgorithmResult {
    pub kind: AlgorithmKind,
    pub nodes: Vec<CityId>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    pub total_distance_km: Option<f64>,
}
