//! HTTP transport for encoded reference payloads

use std::time::Duration;

use async_trait::async_trait;

use crate::config::AttrsConfig;
use crate::errors::{AttrsError, Result};
use crate::model::TableKey;
use crate::store::{EncodedPayload, PayloadFetcher};

/// Fetches encoded tables with `GET {endpoint}?year=..&number_type=..`.
#[derive(Debug, Clone)]
pub struct HttpPayloadFetcher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPayloadFetcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AttrsError::config_with_source("failed to build HTTP client", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn from_config(cfg: &AttrsConfig) -> Result<Self> {
        Self::new(cfg.endpoint.clone(), cfg.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PayloadFetcher for HttpPayloadFetcher {
    async fn fetch(&self, key: TableKey) -> Result<EncodedPayload> {
        let year = key.year.to_string();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("year", year.as_str()), ("number_type", key.range.digits())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AttrsError::fetch_with_source(format!("GET {key} failed"), e))?;

        if !resp.status().is_success() {
            return Err(AttrsError::fetch(format!(
                "GET {key} failed: {}",
                resp.status()
            )));
        }

        let payload: EncodedPayload = resp
            .json()
            .await
            .map_err(|e| AttrsError::fetch_with_source(format!("malformed response for {key}"), e))?;

        tracing::debug!(
            key = %key,
            payload_len = payload.checkstr.len(),
            "fetched encoded reference table"
        );

        Ok(payload)
    }
}
