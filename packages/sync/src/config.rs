//! Synchronization settings loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration pointed at a local backend.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wildfire_map_source::region_registry::{self, RegionFilter};

/// Environment variable that overrides [`SyncConfig::backend_url`].
pub const BACKEND_URL_ENV: &str = "WILDFIRE_BACKEND_URL";

/// Default detection endpoint.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/analyze-fire-map";

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`SyncConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of its allowed range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of the offending value.
        message: String,
    },

    /// `region` names a region that is not in the registry.
    #[error("Unknown region '{id}'")]
    UnknownRegion {
        /// The requested region id.
        id: String,
    },
}

/// Settings for the synchronization layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Detection endpoint URL.
    pub backend_url: String,
    /// Quiet period after the last viewport change before fetching.
    pub debounce_ms: u64,
    /// Lower bound for viewport-derived request radii.
    pub min_radius_km: f64,
    /// Upper bound for viewport-derived request radii.
    pub max_radius_km: f64,
    /// Fixed radius used for explicit search/voice locations.
    pub search_radius_km: f64,
    /// Per-request timeout. Unset means the transport default.
    pub request_timeout_secs: Option<u64>,
    /// Look-back window forwarded to the backend (e.g. `"7d"`).
    pub date_range: Option<String>,
    /// Region id from the region registry used to filter detections.
    pub region: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            debounce_ms: 500,
            min_radius_km: 5.0,
            max_radius_km: 500.0,
            search_radius_km: 50.0,
            request_timeout_secs: None,
            date_range: None,
            region: None,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document does not parse or a value
    /// fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file, applies environment overrides, and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?.with_env_overrides();
        config.validate()?;
        log::debug!("Loaded sync config from {}", path.display());
        Ok(config)
    }

    /// Applies [`BACKEND_URL_ENV`] if it is set.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_backend_url_override(std::env::var(BACKEND_URL_ENV).ok())
    }

    /// Replaces the backend URL when `url` is a non-empty value.
    #[must_use]
    pub fn with_backend_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            log::debug!("Backend URL overridden to {url}");
            self.backend_url = url;
        }
        self
    }

    /// Checks value ranges and that the region exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] or [`ConfigError::UnknownRegion`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.trim().is_empty() {
            return Err(invalid("backend_url must not be empty"));
        }
        if !(self.min_radius_km.is_finite() && self.min_radius_km > 0.0) {
            return Err(invalid("min_radius_km must be a positive number"));
        }
        if !(self.max_radius_km.is_finite() && self.max_radius_km >= self.min_radius_km) {
            return Err(invalid("max_radius_km must be at least min_radius_km"));
        }
        if !(self.search_radius_km.is_finite() && self.search_radius_km > 0.0) {
            return Err(invalid("search_radius_km must be a positive number"));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(invalid("request_timeout_secs must be greater than zero"));
        }
        self.region_filter()?;
        Ok(())
    }

    /// Debounce quiet period.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Request timeout, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Builds the region filter for the configured region, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRegion`] if the id is not registered.
    pub fn region_filter(&self) -> Result<Option<RegionFilter>, ConfigError> {
        self.region
            .as_deref()
            .map(|id| {
                region_registry::region_by_id(id)
                    .map(|region| region.filter())
                    .ok_or_else(|| ConfigError::UnknownRegion { id: id.to_string() })
            })
            .transpose()
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}
