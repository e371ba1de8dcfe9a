use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{envelope::DataEncoding, error::ConfigError, model::TemperatureUnit};

/// One Call endpoint with forecasts and alerts excluded.
pub const OPENWEATHER_URL_PREFIX: &str =
    "https://api.openweathermap.org/data/2.5/onecall?exclude=minutely,hourly,daily,alerts&";

pub const DEFAULT_NATS_SERVER: &str = "nats://localhost:4222";
pub const DEFAULT_NATS_TOPIC: &str = "iot.weather";

/// Runtime configuration. Built once at startup and shared read-only.
///
/// Example YAML:
/// ```yaml
/// apikey: "..."
/// lat: 42.1
/// lon: -71.2
/// zipcode: "01001"
/// natsServer: nats://localhost:4222
/// natsTopic: iot.weather
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(rename = "apikey")]
    pub api_key: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Precomposed upstream URL; takes precedence over key/lat/lon.
    pub url: Option<String>,
    #[serde(rename = "zipcode")]
    pub zip_code: String,
    pub nats_server: String,
    pub nats_topic: String,
    pub poll_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub nats_connect_timeout_secs: u64,
    pub temperature_unit: TemperatureUnit,
    pub data_encoding: DataEncoding,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            lat: None,
            lon: None,
            url: None,
            zip_code: String::new(),
            nats_server: DEFAULT_NATS_SERVER.to_string(),
            nats_topic: DEFAULT_NATS_TOPIC.to_string(),
            poll_interval_secs: 120,
            http_timeout_secs: 10,
            nats_connect_timeout_secs: 5,
            temperature_unit: TemperatureUnit::default(),
            data_encoding: DataEncoding::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then the config file (if any), then the process environment.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with<F>(explicit_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::config_file_path()?;
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        cfg.apply_env(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML config file, or TOML when the extension is `.toml`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let cfg = if is_toml {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(cfg)
    }

    /// Default config file location in the platform config directory.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherbus", "weatherbus")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// Override fields from environment variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(v) = var("OPENWEATHER_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = var("OPENWEATHER_LAT") {
            self.lat = Some(parse_value("OPENWEATHER_LAT", &v)?);
        }
        if let Some(v) = var("OPENWEATHER_LON") {
            self.lon = Some(parse_value("OPENWEATHER_LON", &v)?);
        }
        if let Some(v) = var("OPENWEATHER_URL") {
            self.url = Some(v);
        }
        if let Some(v) = var("ZIPCODE") {
            self.zip_code = v;
        }
        if let Some(v) = var("NATS_SERVER") {
            self.nats_server = v;
        }
        if let Some(v) = var("NATS_TOPIC") {
            self.nats_topic = v;
        }
        if let Some(v) = var("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_value("POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = var("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_value("HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("NATS_CONNECT_TIMEOUT_SECS") {
            self.nats_connect_timeout_secs = parse_value("NATS_CONNECT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("TEMPERATURE_UNIT") {
            self.temperature_unit = parse_value("TEMPERATURE_UNIT", &v)?;
        }
        if let Some(v) = var("DATA_ENCODING") {
            self.data_encoding = parse_value("DATA_ENCODING", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream_url()?;

        if self.nats_topic.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "natsTopic",
                value: self.nats_topic.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pollIntervalSecs",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Full upstream request URL, including API key and coordinates.
    pub fn upstream_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        match (&self.api_key, self.lat, self.lon) {
            (Some(key), Some(lat), Some(lon)) => Ok(format!(
                "{OPENWEATHER_URL_PREFIX}lat={lat}&lon={lon}&APPID={key}"
            )),
            (key, lat, lon) => {
                let mut missing = Vec::new();
                if key.is_none() {
                    missing.push("apikey");
                }
                if lat.is_none() {
                    missing.push("lat");
                }
                if lon.is_none() {
                    missing.push("lon");
                }
                Err(ConfigError::MissingKeys(missing))
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn nats_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.nats_connect_timeout_secs)
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
