use thiserror::Error;

/// Why a route couldn't be obtained. The Display text is meant for the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("couldn't reach the routing service: {0}")]
    Network(String),
    #[error("no drivable route connects these points")]
    NoRoute,
    #[error("the routing service rejected the request: {0}")]
    ProviderRejected(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoError {
    #[error("this device can't report its location")]
    Unsupported,
    #[error("permission to use your location was denied")]
    PermissionDenied,
    #[error("your location is currently unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for your location")]
    Timeout,
    #[error("couldn't determine your location")]
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NarrationError {
    #[error("voice narration isn't supported here")]
    Unsupported,
    #[error("speech engine failed: {0}")]
    Engine(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    #[error("there's no active route")]
    NoActiveRoute,
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("couldn't reach the graph backend: {0}")]
    Network(#[from] reqwest::Error),
    #[error("graph backend answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown city {0}")]
    UnknownCity(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
