//! Direct file links fetched over HTTP

use futures::StreamExt;
use goro_common::config::ResolverConfig;
use std::time::Duration;
use tracing::debug;

use super::ResolveError;
use crate::voice::AudioSource;

/// HTTP client for direct audio file links
///
/// Only connecting and receiving response headers are time-bounded; the body
/// streams for as long as the track plays.
#[derive(Debug, Clone)]
pub struct DirectFileClient {
    http_client: reqwest::Client,
    header_timeout: Duration,
}

impl DirectFileClient {
    pub fn new(config: &ResolverConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http_client,
            header_timeout: config.request_timeout(),
        })
    }

    /// Issue the request and hand back the response body as a stream
    pub async fn fetch(&self, link: &str) -> Result<AudioSource, ResolveError> {
        debug!(link = %link, "Fetching direct file");

        let response = tokio::time::timeout(self.header_timeout, self.http_client.get(link).send())
            .await
            .map_err(|_| ResolveError::FetchFailed {
                status: None,
                reason: format!("no response within {:?}", self.header_timeout),
            })?
            .map_err(|e| ResolveError::FetchFailed {
                status: e.status().map(|s| s.as_u16()),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::FetchFailed {
                status: Some(status.as_u16()),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));

        Ok(AudioSource::stream(link, Box::pin(stream)))
    }
}
