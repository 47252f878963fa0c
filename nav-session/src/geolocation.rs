use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use nav_session_types::Coordinate;

use crate::config::GeolocationConfig;
use crate::error::GeoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Zero means a cached position is never acceptable
    pub max_cache_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::from(&GeolocationConfig::default())
    }
}

impl From<&GeolocationConfig> for PositionOptions {
    fn from(config: &GeolocationConfig) -> Self {
        Self {
            high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            max_cache_age: Duration::from_millis(config.max_cache_age_ms),
        }
    }
}

/// The device's location capability.
#[async_trait]
pub trait PositionSource: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    async fn current_position(&self, options: PositionOptions) -> Result<Coordinate, GeoError>;
}

/// Asks the device where it is, once per call. The platform query can't be cancelled, so after
/// `teardown` any result that still arrives is thrown away instead.
#[derive(Clone)]
pub struct GeolocationAcquirer {
    source: Option<Arc<dyn PositionSource>>,
    options: PositionOptions,
    alive: CancellationToken,
}

impl GeolocationAcquirer {
    pub fn new(source: Option<Arc<dyn PositionSource>>, options: PositionOptions) -> Self {
        Self {
            source,
            options,
            alive: CancellationToken::new(),
        }
    }

    /// For platforms without any location capability
    pub fn unsupported() -> Self {
        Self::new(None, PositionOptions::default())
    }

    pub fn options(&self) -> PositionOptions {
        self.options
    }

    /// None if the acquirer was torn down before the query settled.
    pub async fn acquire(&self) -> Option<Result<Coordinate, GeoError>> {
        let source = match self.source {
            Some(ref source) if source.is_supported() => source.clone(),
            _ => return Some(Err(GeoError::Unsupported)),
        };
        if self.alive.is_cancelled() {
            return None;
        }

        info!("Asking for the device position");
        let query = tokio::time::timeout(
            self.options.timeout,
            source.current_position(self.options),
        );
        let result = tokio::select! {
            _ = self.alive.cancelled() => None,
            result = query => Some(result.unwrap_or(Err(GeoError::Timeout))),
        };

        match result {
            None => {
                debug!("Dropping a position that arrived after teardown");
                None
            }
            Some(Ok(pt)) => {
                info!("Device is at ({}, {})", pt.lat, pt.lng);
                Some(Ok(pt))
            }
            Some(Err(err)) => {
                warn!("Couldn't get the device position: {err}");
                Some(Err(err))
            }
        }
    }

    /// Nothing acquired after this point is ever delivered.
    pub fn teardown(&self) {
        self.alive.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.alive.is_cancelled()
    }
}
