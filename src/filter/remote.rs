//! Filter collaborator reached over HTTP (`POST {type, condition, data, context}`)

use super::types::{FilterError, FilterRequest, FilterService};
use crate::config::PipewrightConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RemoteFilter {
    /// Full URL of the filter endpoint
    endpoint: String,

    timeout: Duration,

    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FilterReply {
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

impl RemoteFilter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, FilterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FilterError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        })
    }

    /// Create from config; `None` when no endpoint is configured
    pub fn from_config(config: &PipewrightConfig) -> Option<Result<Self, FilterError>> {
        let endpoint = config.filter.endpoint.as_ref()?;
        Some(Self::new(endpoint.clone(), config.filter_timeout()))
    }
}

#[async_trait]
impl FilterService for RemoteFilter {
    async fn filter(&self, request: &FilterRequest) -> Result<serde_json::Value, FilterError> {
        let start = Instant::now();
        let send = self.client.post(&self.endpoint).json(request).send();

        let response = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return Err(FilterError::timeout(start.elapsed())),
            Ok(Err(e)) => return Err(FilterError::network(e.to_string())),
            Err(_) => return Err(FilterError::timeout(start.elapsed())),
        };

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FilterError::timeout(start.elapsed())
            } else {
                FilterError::network(format!("failed to read response: {}", e))
            }
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorReply>(&text)
                .map(|r| r.error)
                .unwrap_or(text);
            return Err(FilterError::remote(status.as_u16(), message));
        }

        let reply: FilterReply = serde_json::from_str(&text)
            .map_err(|e| FilterError::parse(format!("invalid filter reply: {}", e)))?;
        Ok(reply.result)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
