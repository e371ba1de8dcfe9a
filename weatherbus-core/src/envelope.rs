//! CloudEvents-shaped envelope around each published record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EnvelopeError;

pub const SPEC_VERSION: &str = "1.0";
pub const EVENT_SOURCE: &str = "com.wellorder.iot.weather";
pub const EVENT_TYPE: &str = "https://openweathermap.org/";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// How the payload is placed in the `data` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    /// Nested JSON object.
    #[default]
    Object,
    /// JSON text carried as a string.
    String,
}

impl std::str::FromStr for DataEncoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "object" => Ok(DataEncoding::Object),
            "string" => Ok(DataEncoding::String),
            _ => Err("expected one of: object, string".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub specversion: String,
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub datacontenttype: String,
    pub time: DateTime<Utc>,
    pub data: Value,
}

impl Envelope {
    /// Wrap a serialized JSON payload in a new envelope with a fresh id.
    pub fn wrap(payload: &[u8], encoding: DataEncoding) -> Result<Self, EnvelopeError> {
        let data = match encoding {
            DataEncoding::Object => {
                serde_json::from_slice(payload).map_err(EnvelopeError::InvalidPayload)?
            }
            DataEncoding::String => Value::String(String::from_utf8(payload.to_vec())?),
        };

        Ok(Self {
            specversion: SPEC_VERSION.to_string(),
            id: Uuid::new_v4().to_string(),
            source: EVENT_SOURCE.to_string(),
            event_type: EVENT_TYPE.to_string(),
            datacontenttype: CONTENT_TYPE_JSON.to_string(),
            time: Utc::now(),
            data,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(EnvelopeError::Serialize)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(EnvelopeError::Decode)
    }

    /// Decode `data` regardless of whether it was embedded as an object or a string.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        match &self.data {
            Value::String(text) => serde_json::from_str(text),
            other => T::deserialize(other),
        }
        .map_err(EnvelopeError::Decode)
    }
}
