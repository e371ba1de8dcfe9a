//! One fetch, transform, envelope and publish cycle.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::{
    config::Config,
    envelope::Envelope,
    error::CycleError,
    fetcher::WeatherSource,
    publisher::EventPublisher,
    transform::{parse_observation, transform},
};

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub envelope_id: String,
    pub topic: String,
    pub payload_bytes: usize,
}

pub struct Pipeline {
    source: Arc<dyn WeatherSource>,
    publisher: Arc<dyn EventPublisher>,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        publisher: Arc<dyn EventPublisher>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            source,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one cycle. Any failing stage aborts the cycle before publishing.
    #[instrument(skip(self), fields(topic = %self.config.nats_topic))]
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let body = self.source.fetch().await?;

        let raw = parse_observation(&body)?;
        let weather = transform(&raw, &self.config.zip_code, self.config.temperature_unit)?;
        let payload = serde_json::to_vec(&weather).map_err(CycleError::Serialize)?;

        let envelope = Envelope::wrap(&payload, self.config.data_encoding)?;
        let bytes = envelope.to_bytes()?;
        debug!(id = %envelope.id, data = %String::from_utf8_lossy(&payload), "Built envelope");

        let payload_bytes = bytes.len();
        self.publisher
            .publish(&self.config.nats_topic, Bytes::from(bytes))
            .await?;

        info!(id = %envelope.id, payload_bytes, "Published weather event");

        Ok(CycleReport {
            envelope_id: envelope.id,
            topic: self.config.nats_topic.clone(),
            payload_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        envelope::DataEncoding,
        error::{FetchError, PublishError, SchemaError},
        fetcher::MockWeatherSource,
        model::{NormalizedWeather, TemperatureUnit},
        publisher::MockEventPublisher,
    };
    use std::sync::Mutex;

    const SCENARIO: &str = r#"{"lat":42.1,"lon":-71.2,"current":{"temp":275.85,"humidity":74,"uvi":0,"pressure":1021,"weather":[{"description":"clear sky"}]}}"#;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            url: Some("http://localhost/onecall".into()),
            zip_code: "01001".into(),
            ..Config::default()
        })
    }

    fn source_returning(body: &'static str, times: usize) -> MockWeatherSource {
        let mut source = MockWeatherSource::new();
        source
            .expect_fetch()
            .times(times)
            .returning(move || Ok(body.as_bytes().to_vec()));
        source
    }

    /// Publisher that records every (topic, payload) it is handed.
    fn recording_publisher(
        times: usize,
    ) -> (MockEventPublisher, Arc<Mutex<Vec<(String, Bytes)>>>) {
        let published = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);

        let mut publisher = MockEventPublisher::new();
        publisher
            .expect_publish()
            .times(times)
            .returning(move |topic, payload| {
                sink.lock().unwrap().push((topic.to_string(), payload));
                Ok(())
            });

        (publisher, published)
    }

    #[tokio::test]
    async fn successful_cycle_publishes_scenario_payload() {
        let (publisher, published) = recording_publisher(1);
        let pipeline = Pipeline::new(
            Arc::new(source_returning(SCENARIO, 1)),
            Arc::new(publisher),
            test_config(),
        );

        let report = pipeline.run_cycle().await.unwrap();

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (topic, bytes) = &published[0];
        assert_eq!(topic, "iot.weather");
        assert_eq!(report.payload_bytes, bytes.len());

        let envelope = Envelope::from_bytes(bytes).unwrap();
        assert_eq!(envelope.id, report.envelope_id);
        assert_eq!(envelope.datacontenttype, "application/json");

        let data = &envelope.data;
        assert_eq!(data["temp"].as_f64(), Some(275.85));
        assert_eq!(data["humidity"].as_f64(), Some(0.74));
        assert_eq!(data["uvi"].as_f64(), Some(0.0));
        assert_eq!(data["pressure"].as_f64(), Some(1021.0));
        assert_eq!(data["location"]["lat"].as_f64(), Some(42.1));
        assert_eq!(data["location"]["lon"].as_f64(), Some(-71.2));
        assert_eq!(data["location"]["zip"], "01001");
        assert_eq!(data["descriptions"], serde_json::json!(["clear sky"]));
    }

    #[tokio::test]
    async fn consecutive_cycles_use_distinct_ids_on_same_topic() {
        let (publisher, published) = recording_publisher(2);
        let pipeline = Pipeline::new(
            Arc::new(source_returning(SCENARIO, 2)),
            Arc::new(publisher),
            test_config(),
        );

        let first = pipeline.run_cycle().await.unwrap();
        let second = pipeline.run_cycle().await.unwrap();

        assert_ne!(first.envelope_id, second.envelope_id);
        assert_eq!(first.envelope_id.len(), 36);
        assert_eq!(second.envelope_id.len(), 36);

        let published = published.lock().unwrap();
        assert!(published.iter().all(|(topic, _)| topic == "iot.weather"));
    }

    #[tokio::test]
    async fn fetch_failure_skips_publish() {
        let mut source = MockWeatherSource::new();
        source.expect_fetch().times(1).returning(|| {
            Err(FetchError::Status {
                status: 500,
                body: "oops".into(),
            })
        });
        let (publisher, _) = recording_publisher(0);

        let pipeline = Pipeline::new(Arc::new(source), Arc::new(publisher), test_config());

        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Fetch(FetchError::Status { status: 500, .. })));
        assert_eq!(err.stage(), "fetch");
    }

    #[tokio::test]
    async fn schema_failure_skips_publish() {
        let (publisher, _) = recording_publisher(0);
        let pipeline = Pipeline::new(
            Arc::new(source_returning(r#"{"current":{"temp":280}}"#, 1)),
            Arc::new(publisher),
            test_config(),
        );

        let err = pipeline.run_cycle().await.unwrap_err();
        assert_eq!(err.stage(), "transform");
    }

    #[tokio::test]
    async fn array_body_is_never_published() {
        let (publisher, published) = recording_publisher(0);
        let pipeline = Pipeline::new(
            Arc::new(source_returning(r#"[42.1,-71.2,{}]"#, 1)),
            Arc::new(publisher),
            test_config(),
        );

        let err = pipeline.run_cycle().await.unwrap_err();

        assert!(matches!(err, CycleError::Schema(SchemaError::InvalidJson(_))));
        assert!(published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_returned() {
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().times(1).returning(|topic, _| {
            Err(PublishError::Publish {
                topic: topic.to_string(),
                reason: "disconnected".into(),
            })
        });

        let pipeline = Pipeline::new(
            Arc::new(source_returning(SCENARIO, 1)),
            Arc::new(publisher),
            test_config(),
        );

        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Publish(_)));
    }

    #[tokio::test]
    async fn configured_unit_and_encoding_reach_the_payload() {
        let config = Arc::new(Config {
            url: Some("http://localhost/onecall".into()),
            temperature_unit: TemperatureUnit::Celsius,
            data_encoding: DataEncoding::String,
            ..Config::default()
        });
        let (publisher, published) = recording_publisher(1);
        let pipeline = Pipeline::new(
            Arc::new(source_returning(SCENARIO, 1)),
            Arc::new(publisher),
            config,
        );

        pipeline.run_cycle().await.unwrap();

        let published = published.lock().unwrap();
        let envelope = Envelope::from_bytes(&published[0].1).unwrap();
        assert!(envelope.data.is_string());

        let weather: NormalizedWeather = envelope.data_as().unwrap();
        assert!((weather.temp.unwrap() - 2.7).abs() < 1e-9);
    }
}
