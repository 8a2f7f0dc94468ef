//! Core types and trait for the outbound HTTP collaborator

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while performing an outbound request
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Request timed out
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Connection or protocol failure
    #[error("network error: {message}")]
    Network { message: String },

    /// The server answered with a non-success status
    #[error("Request failed with status code {status}")]
    Status { status: u16, body: serde_json::Value },

    /// The request could not be built
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl TransportError {
    /// Create a timeout error
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a status error
    pub fn status(status: u16, body: serde_json::Value) -> Self {
        Self::Status { status, body }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// An outbound HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Upper-case method name
    pub method: String,

    pub url: String,

    pub headers: BTreeMap<String, String>,

    /// JSON body; `None` sends no body at all
    pub body: Option<serde_json::Value>,

    /// Override the transport's default timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with no headers and no body
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set headers
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,

    /// Decoded as JSON when possible, otherwise the raw text as a string
    pub body: serde_json::Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs outbound HTTP requests on behalf of steps
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request; any status code is an `Ok` response
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl HttpTransport for Box<dyn HttpTransport> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Decode a response body as JSON, falling back to the raw text
pub fn decode_body(text: &str) -> serde_json::Value {
    if text.is_empty() {
        return serde_json::Value::String(String::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}
