use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Upstream One Call response, reduced to the keys the transformer reads.
///
/// Every field decodes independently: a key that is missing or carries the
/// wrong JSON type becomes `None` instead of failing the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawObservation {
    #[serde(default, deserialize_with = "lenient::number")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub current: Option<RawCurrent>,
}

/// The `current` conditions object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCurrent {
    #[serde(default, deserialize_with = "lenient::number")]
    pub dt: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub feels_like: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pressure: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub dew_point: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub uvi: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub clouds: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub visibility: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub wind_deg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sunrise: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sunset: Option<f64>,
    /// Descriptions extracted from `weather[].description`, in order.
    #[serde(default, rename = "weather", deserialize_with = "lenient::descriptions")]
    pub descriptions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub rain: Option<RawPrecipitation>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub snow: Option<RawPrecipitation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrecipitation {
    #[serde(default, rename = "1h", deserialize_with = "lenient::number")]
    pub one_hour: Option<f64>,
    #[serde(default, rename = "3h", deserialize_with = "lenient::number")]
    pub three_hour: Option<f64>,
}

/// Normalized current conditions for one poll cycle.
///
/// Humidity and cloud cover are fractions in `0..=1`. Temperatures are in
/// whatever [`TemperatureUnit`] the transformer was asked for (Kelvin by
/// default). Absent scalars are omitted from the serialized form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedWeather {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feels_like: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    #[serde(alias = "loc")]
    pub location: Location,
    #[serde(default)]
    pub descriptions: Vec<String>,
    #[serde(default)]
    pub rain: Precipitation,
    #[serde(default)]
    pub snow: Precipitation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    /// Opaque label from configuration; never sent upstream.
    pub zip: String,
}

/// Precipitation volume in mm over the last hour / three hours.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(default, rename = "1h", skip_serializing_if = "Option::is_none")]
    pub one_hour: Option<f64>,
    #[serde(default, rename = "3h", skip_serializing_if = "Option::is_none")]
    pub three_hour: Option<f64>,
}

impl Precipitation {
    pub fn is_empty(&self) -> bool {
        self.one_hour.is_none() && self.three_hour.is_none()
    }
}

impl From<&RawPrecipitation> for Precipitation {
    fn from(raw: &RawPrecipitation) -> Self {
        Self {
            one_hour: raw.one_hour,
            three_hour: raw.three_hour,
        }
    }
}

/// Unit for published temperatures. Upstream always reports Kelvin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Kelvin,
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Kelvin => "kelvin",
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }

    /// Convert a Kelvin reading into this unit.
    pub fn convert_kelvin(self, kelvin: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin,
            TemperatureUnit::Celsius => kelvin - 273.15,
            TemperatureUnit::Fahrenheit => (kelvin - 273.15) * 9.0 / 5.0 + 32.0,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "kelvin" | "k" => Ok(TemperatureUnit::Kelvin),
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err("expected one of: kelvin, celsius, fahrenheit".to_string()),
        }
    }
}

/// Deserializers that turn a wrong-typed value into `None` instead of an error.
mod lenient {
    use serde::{Deserialize, Deserializer, de::DeserializeOwned};
    use serde_json::Value;

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Value::deserialize(deserializer)?.as_f64())
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }

    pub fn descriptions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(entries) = value.as_array() else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("description")?.as_str())
            .map(str::to_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_weather_roundtrip() {
        let weather = NormalizedWeather {
            dt: Some(1_700_000_000.0),
            temp: Some(275.85),
            humidity: Some(0.74),
            clouds: Some(0.2),
            location: Location {
                lat: 42.1,
                lon: -71.2,
                zip: "01001".to_string(),
            },
            descriptions: vec!["clear sky".to_string(), "mist".to_string()],
            rain: Precipitation {
                one_hour: Some(0.3),
                three_hour: None,
            },
            ..Default::default()
        };

        let bytes = serde_json::to_vec(&weather).unwrap();
        let parsed: NormalizedWeather = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(parsed, weather);
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let weather = NormalizedWeather {
            temp: Some(280.0),
            ..Default::default()
        };

        let value = serde_json::to_value(&weather).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("temp"));
        assert!(!object.contains_key("humidity"));
        assert!(!object.contains_key("feels_like"));
        assert_eq!(value["rain"], serde_json::json!({}));
        assert_eq!(value["snow"], serde_json::json!({}));
        assert_eq!(value["descriptions"], serde_json::json!([]));
    }

    #[test]
    fn location_accepts_legacy_loc_key() {
        let parsed: NormalizedWeather =
            serde_json::from_str(r#"{"loc":{"lat":1.0,"lon":2.0,"zip":"x"}}"#).unwrap();
        assert_eq!(parsed.location.zip, "x");
    }

    #[test]
    fn raw_observation_ignores_wrong_types() {
        let raw: RawObservation = serde_json::from_str(
            r#"{"lat":1.5,"lon":"west","current":{"temp":"hot","humidity":50,"weather":"sunny","rain":[1,2]}}"#,
        )
        .unwrap();

        assert_eq!(raw.lat, Some(1.5));
        assert_eq!(raw.lon, None);
        let current = raw.current.unwrap();
        assert_eq!(current.temp, None);
        assert_eq!(current.humidity, Some(50.0));
        assert!(current.descriptions.is_empty());
        assert!(current.rain.is_none());
    }

    #[test]
    fn raw_descriptions_skip_malformed_entries() {
        let raw: RawCurrent = serde_json::from_str(
            r#"{"weather":[{"description":"light rain"},{"main":"Rain"},42,{"description":"mist"}]}"#,
        )
        .unwrap();

        assert_eq!(raw.descriptions, vec!["light rain", "mist"]);
    }

    #[test]
    fn temperature_unit_conversion() {
        assert_eq!(TemperatureUnit::Kelvin.convert_kelvin(300.0), 300.0);
        assert!((TemperatureUnit::Celsius.convert_kelvin(273.15)).abs() < 1e-9);
        assert!((TemperatureUnit::Fahrenheit.convert_kelvin(373.15) - 212.0).abs() < 1e-9);
    }

    #[test]
    fn temperature_unit_from_str() {
        assert_eq!("Celsius".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Celsius));
        assert_eq!("f".parse::<TemperatureUnit>(), Ok(TemperatureUnit::Fahrenheit));
        assert!("rankine".parse::<TemperatureUnit>().is_err());
    }
}
