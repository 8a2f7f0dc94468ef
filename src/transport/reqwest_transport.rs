//! reqwest-backed HTTP transport

use super::types::{HttpRequest, HttpResponse, HttpTransport, TransportError, decode_body};
use crate::config::PipewrightConfig;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Transport that performs real network requests
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    /// Default timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with an explicit timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::invalid_request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { timeout, client })
    }

    /// Create a transport from the `[http]` config section
    pub fn from_config(config: &PipewrightConfig) -> Result<Self, TransportError> {
        Self::new(config.http_timeout(), &config.http.user_agent)
    }

    fn build(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::invalid_request(format!("invalid method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        // A JSON null body is not worth sending
        if let Some(body) = request.body.as_ref().filter(|b| !b.is_null()) {
            builder = builder.json(body);
        }

        Ok(builder)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let start = Instant::now();
        let builder = self.build(request)?;

        debug!(method = %request.method, url = %request.url, "sending request");

        let timeout = request.timeout.unwrap_or(self.timeout);
        let result = tokio::time::timeout(timeout, builder.send()).await;
        let elapsed = start.elapsed();

        match result {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let text = response.text().await.map_err(|e| {
                    if e.is_timeout() {
                        TransportError::timeout(start.elapsed())
                    } else {
                        TransportError::network(format!("failed to read response: {}", e))
                    }
                })?;

                debug!(status, elapsed_ms = elapsed.as_millis() as u64, "received response");
                Ok(HttpResponse::new(status, decode_body(&text)))
            }
            Ok(Err(e)) => {
                if e.is_timeout() {
                    Err(TransportError::timeout(elapsed))
                } else if e.is_builder() {
                    Err(TransportError::invalid_request(e.to_string()))
                } else if e.is_connect() {
                    Err(TransportError::network(format!("connection failed: {}", e)))
                } else {
                    Err(TransportError::network(format!("request failed: {}", e)))
                }
            }
            Err(_) => Err(TransportError::timeout(elapsed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(5), "pipewright-test").unwrap()
    }

    #[test]
    fn test_from_config() {
        let mut config = PipewrightConfig::default();
        config.http.timeout = Some(12);
        config.http.user_agent = "custom-agent".into();
        let transport = ReqwestTransport::from_config(&config).unwrap();
        assert_eq!(transport.timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_build_rejects_invalid_method() {
        let request = HttpRequest::new("NOT A METHOD", "https://example.com");
        assert!(matches!(
            transport().build(&request),
            Err(TransportError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_build_attaches_body_and_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("X-Trace".to_string(), "abc".to_string());
        let request = HttpRequest::new("POST", "https://example.com/items")
            .with_headers(headers)
            .with_body(json!({"a": 1}));

        let built = transport().build(&request).unwrap().build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.headers().get("X-Trace").unwrap(), "abc");
        assert!(built.body().is_some());
    }

    #[test]
    fn test_build_skips_null_body() {
        let request = HttpRequest::new("PUT", "https://example.com/items").with_body(json!(null));
        let built = transport().build(&request).unwrap().build().unwrap();
        assert!(built.body().is_none());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport = ReqwestTransport::new(Duration::from_millis(50), "pipewright-test").unwrap();
        let request = HttpRequest::new("GET", format!("http://{}/slow", addr));
        let err = transport.send(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }), "got {:?}", err);

        server.abort();
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let request = HttpRequest::new("GET", "http://127.0.0.1:1/unreachable");
        let err = transport().send(&request).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Network { .. } | TransportError::Timeout { .. }
        ));
    }
}
