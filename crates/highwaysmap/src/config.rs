//! Configuration management for highwaysmap.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::style::{StyleConfig, StyleTable};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "highwaysmap";

/// Prefix for namespaced environment variables.
const ENV_PREFIX: &str = "HIGHWAYSMAP_";

/// Default closures endpoint.
pub const DEFAULT_API_URL: &str = "https://api.data.nationalhighways.co.uk/roads/v1.0/closures";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. The bare `SUBSCRIPTION_KEY`, `HOST` and `PORT` environment variables
/// 2. Environment variables prefixed with `HIGHWAYSMAP_` (`__` separates sections)
/// 3. TOML config file at `~/.config/highwaysmap/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web server configuration.
    pub server: ServerConfig,
    /// Upstream API configuration.
    pub upstream: UpstreamConfig,
    /// Map rendering configuration.
    pub map: MapConfig,
    /// Closure styling.
    pub style: StyleConfig,
}

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// `max-age` sent with successful map pages, in seconds.
    pub cache_max_age_secs: u64,
    /// Gzip responses for clients that accept it.
    pub compression: bool,
}

/// Upstream API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Closures endpoint.
    pub api_url: String,
    /// API subscription key.
    pub subscription_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Map rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Latitude the map opens on.
    pub center_lat: f64,
    /// Longitude the map opens on.
    pub center_lon: f64,
    /// Zoom level the map opens at.
    pub zoom: u8,
    /// Stroke width for closure lines, in pixels.
    pub line_weight: u32,
    /// `strftime` format for times in popups.
    pub time_format: String,
    /// Tile URL template.
    pub tile_url: String,
    /// Tile attribution (HTML).
    pub attribution: String,
    /// Page title.
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cache_max_age_secs: 3600,
            compression: true,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            subscription_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            // Central London; zoom 7 shows most of England.
            center_lat: 51.509_865,
            center_lon: -0.118_092,
            zoom: 7,
            line_weight: 5,
            time_format: "%d/%m/%Y %H:%M".to_string(),
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
                .to_string(),
            title: "Road closures".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The subscription key, treating an empty value as unset.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.subscription_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether a usable subscription key is configured.
    #[must_use]
    pub fn has_key(&self) -> bool {
        self.key().is_some()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config: Config = Self::figment(config_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// The layered figment behind [`Config::load_from`].
    #[must_use]
    pub fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(
                Env::raw()
                    .only(&["host", "port"])
                    .map(|key| format!("server.{}", key.as_str().to_ascii_lowercase()).into()),
            )
            .merge(
                Env::raw()
                    .only(&["subscription_key"])
                    .map(|_| "upstream.subscription_key".into()),
            )
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// A missing subscription key is deliberately not checked here: the
    /// server still starts and reports it on every request.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("port must be greater than 0"));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than 0"));
        }

        if self.upstream.api_url.trim().is_empty() {
            return Err(Error::config("api_url must not be empty"));
        }

        if !(-90.0..=90.0).contains(&self.map.center_lat) {
            return Err(Error::config(format!(
                "center_lat ({}) must be between -90 and 90",
                self.map.center_lat
            )));
        }

        if !(-180.0..=180.0).contains(&self.map.center_lon) {
            return Err(Error::config(format!(
                "center_lon ({}) must be between -180 and 180",
                self.map.center_lon
            )));
        }

        if self.map.zoom > 19 {
            return Err(Error::config(format!(
                "zoom ({}) must be between 0 and 19",
                self.map.zoom
            )));
        }

        if self.map.line_weight == 0 {
            return Err(Error::config("line_weight must be greater than 0"));
        }

        if StrftimeItems::new(&self.map.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::config(format!(
                "invalid time_format: {}",
                self.map.time_format
            )));
        }

        StyleTable::from_config(&self.style)?;

        Ok(())
    }

    /// Build the style table described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a style rule is invalid.
    pub fn style_table(&self) -> Result<StyleTable> {
        StyleTable::from_config(&self.style)
    }

    /// The socket address string the server binds.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// A copy of this configuration with the subscription key masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(key) = &mut config.upstream.subscription_key {
            *key = "********".to_string();
        }
        config
    }

    /// Get the cache max age as a Duration.
    #[must_use]
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.server.cache_max_age_secs)
    }
}
