//! Mapping from the upstream One Call payload to [`NormalizedWeather`].

use chrono::DateTime;
use serde::de::{self, Unexpected};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::SchemaError,
    model::{Location, NormalizedWeather, Precipitation, RawObservation, TemperatureUnit},
};

/// Decode an upstream response body. The top level must be a JSON object.
pub fn parse_observation(body: &[u8]) -> Result<RawObservation, SchemaError> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(SchemaError::InvalidJson(de::Error::invalid_type(
            unexpected(&value),
            &"a JSON object",
        )));
    }

    let raw: RawObservation = serde_json::from_value(value)?;
    Ok(raw)
}

fn unexpected(value: &Value) -> Unexpected<'_> {
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}

/// Build the normalized record for one observation.
///
/// Only `current`, `lat` and `lon` are required. Every other field is copied
/// when numeric and left out otherwise. `zip_code` is attached verbatim.
pub fn transform(
    raw: &RawObservation,
    zip_code: &str,
    unit: TemperatureUnit,
) -> Result<NormalizedWeather, SchemaError> {
    let current = raw.current.as_ref().ok_or(SchemaError::MissingCurrent)?;
    let lat = raw.lat.ok_or(SchemaError::MissingField("lat"))?;
    let lon = raw.lon.ok_or(SchemaError::MissingField("lon"))?;

    let temperature = |kelvin: Option<f64>| kelvin.map(|k| unit.convert_kelvin(k));

    let weather = NormalizedWeather {
        dt: current.dt,
        temp: temperature(current.temp),
        feels_like: temperature(current.feels_like),
        uvi: current.uvi,
        pressure: current.pressure,
        humidity: current.humidity.map(percent_to_fraction),
        sunrise: current.sunrise,
        sunset: current.sunset,
        clouds: current.clouds.map(percent_to_fraction),
        wind_deg: current.wind_deg,
        wind_speed: current.wind_speed,
        dew_point: temperature(current.dew_point),
        visibility: current.visibility,
        location: Location {
            lat,
            lon,
            zip: zip_code.to_owned(),
        },
        descriptions: current.descriptions.clone(),
        rain: current.rain.as_ref().map(Precipitation::from).unwrap_or_default(),
        snow: current.snow.as_ref().map(Precipitation::from).unwrap_or_default(),
    };

    let observed_at = current
        .dt
        .and_then(|ts| DateTime::from_timestamp(ts as i64, 0))
        .map(|t| t.to_rfc3339());

    info!(
        lat,
        lon,
        zip = zip_code,
        observed_at = observed_at.as_deref().unwrap_or("unknown"),
        temp_f = ?current.temp.map(|k| TemperatureUnit::Fahrenheit.convert_kelvin(k)),
        descriptions = ?weather.descriptions,
        "Transformed current conditions"
    );
    debug!(?weather, "Normalized weather record");

    Ok(weather)
}

fn percent_to_fraction(percent: f64) -> f64 {
    percent / 100.0
}
