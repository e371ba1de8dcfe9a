//! Core library for the `weatherbus` daemon.
//!
//! This crate defines:
//! - Configuration loading (file + environment)
//! - Fetching current conditions from OpenWeather
//! - Normalizing them into a stable schema and wrapping them in an event envelope
//! - Publishing envelopes to NATS on a fixed schedule
//!
//! It is used by `weatherbus-cli`, but the pipeline pieces can be reused on their own.

pub mod config;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;
pub mod transform;

pub use config::Config;
pub use envelope::{DataEncoding, Envelope};
pub use error::{ConfigError, CycleError, EnvelopeError, FetchError, PublishError, SchemaError};
pub use fetcher::{OpenWeatherClient, WeatherSource};
pub use model::{NormalizedWeather, RawObservation, TemperatureUnit};
pub use pipeline::{CycleReport, Pipeline};
pub use publisher::{EventPublisher, NatsPublisher};
pub use scheduler::{Scheduler, SchedulerStats};
