use async_trait::async_trait;
use reqwest::{Client, Response};
use std::{fmt, time::Duration};
use tracing::debug;

use crate::error::FetchError;

/// Source of raw upstream weather payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch one response body.
    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

/// Largest successful response body accepted. One Call current conditions are a few KiB.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Bytes read from a failed response; only a truncated excerpt is reported.
const ERROR_BODY_BYTES: usize = 1024;

/// HTTP client for the OpenWeather One Call endpoint.
#[derive(Clone)]
pub struct OpenWeatherClient {
    url: String,
    http: Client,
    max_body_bytes: usize,
}

impl OpenWeatherClient {
    /// `url` must already carry the API key, coordinates and exclusion filter.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.into(),
            http,
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

// The URL carries the API key.
impl fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let res = self.http.get(&self.url).send().await?;

        let status = res.status();

        if !status.is_success() {
            let (body, _) = read_capped(res, ERROR_BODY_BYTES).await?;
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate_body(&String::from_utf8_lossy(&body)),
            });
        }

        let limit = self.max_body_bytes;
        if res.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::BodyTooLarge { limit });
        }

        let (body, truncated) = read_capped(res, limit).await?;
        if truncated {
            return Err(FetchError::BodyTooLarge { limit });
        }

        debug!(
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&body),
            "Received OpenWeather response"
        );

        Ok(body)
    }
}

/// Read at most `limit` bytes of the body. The flag is set when more data followed.
async fn read_capped(mut res: Response, limit: usize) -> Result<(Vec<u8>, bool), FetchError> {
    let mut body = Vec::new();

    while let Some(chunk) = res.chunk().await? {
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }

    Ok((body, false))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
