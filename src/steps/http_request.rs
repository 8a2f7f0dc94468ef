//! HTTP request step

use super::types::{StepError, StepExecutor, StepKind};
use crate::config::Step;
use crate::transport::{HttpRequest, HttpTransport, TransportError};
use crate::workflow::Namespace;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Sends the step's input (except for GET and DELETE) and returns the
/// response body
pub struct HttpRequestExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl HttpRequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

/// Build the outbound request from step config and input
fn build_request(step: &Step, input: &Value) -> Result<HttpRequest, StepError> {
    let method = match step.config_value("method") {
        None | Some(Value::Null) => "GET".to_string(),
        Some(Value::String(m)) if !m.trim().is_empty() => m.trim().to_ascii_uppercase(),
        Some(other) => {
            return Err(StepError::invalid_config(format!("method must be a string, got {}", other)));
        }
    };
    if !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(StepError::invalid_config(format!("invalid method '{}'", method)));
    }

    let url = match step.config_value("url") {
        None | Some(Value::Null) => None,
        Some(Value::String(u)) => Some(u.trim()).filter(|u| !u.is_empty()),
        Some(other) => {
            return Err(StepError::invalid_config(format!("url must be a string, got {}", other)));
        }
    }
    .ok_or_else(|| StepError::missing_config(StepKind::HttpRequest, "url"))?;

    let headers = parse_headers(step.config_value("headers"))?;

    let mut request = HttpRequest::new(method, url).with_headers(headers);
    if request.method != "GET" && request.method != "DELETE" {
        request = request.with_body(input.clone());
    }
    Ok(request)
}

fn parse_headers(value: Option<&Value>) -> Result<BTreeMap<String, String>, StepError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(StepError::invalid_config(format!("headers must be an object, got {}", other)));
        }
    };

    map.iter()
        .map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(StepError::invalid_config(format!(
                        "header '{}' must be a string, got {}",
                        name, other
                    )));
                }
            };
            Ok((name.clone(), text))
        })
        .collect()
}

#[async_trait]
impl StepExecutor for HttpRequestExecutor {
    async fn execute(
        &self,
        step: &Step,
        input: &Value,
        _namespace: &Namespace,
    ) -> Result<Value, StepError> {
        let request = build_request(step, input)?;
        debug!(step = %step.id, method = %request.method, url = %request.url, "http request");

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(TransportError::status(response.status, response.body).into());
        }
        Ok(response.body)
    }
}
