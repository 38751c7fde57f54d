//! Client for the upstream subscriptions report.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::SourceConfig;
use crate::errors::LoadError;
use crate::models::RawRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Anything that can produce raw subscription rows for inclusive bounds.
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn fetch(&self, date_from: &str, date_to: &str) -> Result<Vec<RawRecord>, LoadError>;
}

#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    url: String,
    username: String,
    password: String,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> Result<Self, LoadError> {
        let mut builder = Client::builder().danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LoadError::transport_with_source("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl SubscriptionSource for HttpSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self, date_from: &str, date_to: &str) -> Result<Vec<RawRecord>, LoadError> {
        let started = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .query(&[("from", date_from), ("to", date_to)])
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LoadError::transport_with_source("request timed out", e)
                } else {
                    LoadError::transport_with_source("request failed", e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::transport(format!(
                "upstream returned status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LoadError::transport_with_source("failed to read response body", e))?;
        debug!(bytes = body.len(), "received response body");

        let records = decode_records(&body)?;
        info!(
            rows = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched subscriptions"
        );
        Ok(records)
    }
}

/// Decodes a UTF-8 JSON array of objects.
pub fn decode_records(body: &[u8]) -> Result<Vec<RawRecord>, LoadError> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    Ok(serde_json::from_slice(body)?)
}
