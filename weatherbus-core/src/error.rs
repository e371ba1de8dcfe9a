//! Error types for each stage of the weather pipeline.

use thiserror::Error;

/// Invalid or incomplete configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a precomposed URL nor the full key/lat/lon triple was given.
    #[error(
        "Missing upstream configuration: {}.\n\
         Hint: set OPENWEATHER_URL, or OPENWEATHER_KEY, OPENWEATHER_LAT and OPENWEATHER_LON.",
        .0.join(", ")
    )]
    MissingKeys(Vec<&'static str>),

    /// A value could not be parsed into the expected type.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Failure to obtain a response body from the upstream weather API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Upstream request timed out")]
    Timeout,

    #[error("Connection to upstream failed: {0}")]
    Connection(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Upstream response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The upstream answered with a non-success status code.
    #[error("Upstream request failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// The upstream body did not have the shape required to build a record.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Upstream body is not a JSON object: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Upstream body has no `current` object")]
    MissingCurrent,

    #[error("Upstream body is missing required numeric field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Envelope payload is not valid JSON: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("Envelope payload is not UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),

    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to decode envelope data: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to connect to NATS at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("Failed to publish to '{topic}': {reason}")]
    Publish { topic: String, reason: String },

    #[error("Failed to flush NATS connection: {0}")]
    Flush(String),
}

/// Failure of a single fetch-transform-envelope-publish cycle, by stage.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to serialize normalized weather: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CycleError {
    /// Short stage name, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Schema(_) => "transform",
            CycleError::Serialize(_) => "serialize",
            CycleError::Envelope(_) => "envelope",
            CycleError::Publish(_) => "publish",
        }
    }
}
