use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::locale::Locale;

pub const DEFAULT_PROVIDER_URL: &str = "https://router.project-osrm.org/route/v1";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/api";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// BCP-47 tag used for the provider's instructions and for picking a voice
    pub language: String,
    pub profile: String,
    pub provider_url: String,
    pub backend_url: String,
    pub request_timeout_secs: u64,
    /// Request a new route as soon as both endpoints are known after any change
    pub auto_route: bool,
    pub narration: NarrationConfig,
    pub geolocation: GeolocationConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            profile: "driving".to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: 30,
            auto_route: true,
            narration: NarrationConfig::default(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.narration.validate()?;
        if self.geolocation.timeout_ms == 0 {
            return Err(ConfigError::Zero("geolocation.timeout_ms"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Zero("request_timeout_secs"));
        }
        Ok(())
    }

    pub fn locale(&self) -> Locale {
        Locale::from_tag(&self.language)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Wait between cancelling the engine and starting the next utterance. Some engines process a
    /// cancel asynchronously and would swallow an utterance queued right behind it.
    pub settle_ms: u64,
    /// Silence between items of a narrated sequence
    pub pause_ms: u64,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub announce_distance_over_meters: f64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            pause_ms: 500,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            announce_distance_over_meters: 50.0,
        }
    }
}

impl NarrationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("narration.rate", self.rate, 0.1, 10.0)?;
        check_range("narration.pitch", self.pitch, 0.0, 2.0)?;
        check_range("narration.volume", self.volume, 0.0, 1.0)?;
        Ok(())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

fn check_range(field: &'static str, value: f32, min: f64, max: f64) -> Result<(), ConfigError> {
    let value = value as f64;
    if value < min || value > max || value.is_nan() {
        return Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_cache_age_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 10_000,
            max_cache_age_ms: 0,
        }
    }
}
