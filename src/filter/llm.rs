//! OpenAI-compatible chat model used by the in-process filter

use super::types::FilterError;
use crate::config::PipewrightConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// A chat completion capability
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a system and user message, returning the reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String, FilterError>;

    /// Model name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl ChatModel for Box<dyn ChatModel> {
    async fn complete(&self, system: &str, user: &str) -> Result<String, FilterError> {
        (**self).complete(system, user).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Chat model reached over an OpenAI-compatible HTTP API
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    /// Base URL for the API
    base_url: String,

    api_key: Option<String>,

    /// Model ID to use
    model: String,

    temperature: f32,

    /// Default timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiChat {
    /// Create a chat model with explicit parameters
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FilterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FilterError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: 0.1,
            timeout,
            client,
        })
    }

    /// Create from the `[llm]` config section
    pub fn from_config(config: &PipewrightConfig) -> Result<Self, FilterError> {
        let mut chat = Self::new(&config.llm.base_url, &config.llm.model, config.llm_timeout())?
            .with_temperature(config.llm.temperature);
        if let Some(ref key) = config.llm.api_key {
            chat = chat.with_api_key(key);
        }
        Ok(chat)
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the chat completion URL
    fn chat_completion_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Map HTTP status to FilterError
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> FilterError {
        match status.as_u16() {
            401 | 403 => FilterError::model(format!("authentication failed (HTTP {}): {}", status, body)),
            429 => FilterError::model(format!("rate limited (HTTP {})", status)),
            408 | 504 => FilterError::timeout(self.timeout),
            _ => FilterError::model(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, FilterError> {
        let start = Instant::now();

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let mut http_request = self.client.post(self.chat_completion_url()).json(&body);
        if let Some(ref key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", key));
        }

        let result = tokio::time::timeout(self.timeout, http_request.send()).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(self.map_http_error(status, &body));
                }

                let completion: ChatCompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| FilterError::parse(format!("failed to parse response: {}", e)))?;

                debug!(model = %self.model, elapsed_ms = elapsed.as_millis() as u64, "model replied");

                completion
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| FilterError::model("response contained no message"))
            }
            Ok(Err(e)) => {
                if e.is_timeout() {
                    Err(FilterError::timeout(elapsed))
                } else if e.is_connect() {
                    Err(FilterError::network(format!("connection failed: {}", e)))
                } else {
                    Err(FilterError::network(format!("request failed: {}", e)))
                }
            }
            Err(_) => Err(FilterError::timeout(elapsed)),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}
