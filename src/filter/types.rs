//! Core types and trait for the natural-language filter collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// What shape of data a filter operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Keep the items of a sequence that match
    Array,
    /// Drop the fields of a record that match
    Object,
}

impl FilterKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether `data` has the shape this kind expects
    pub fn accepts(&self, data: &serde_json::Value) -> bool {
        match self {
            Self::Array => data.is_array(),
            Self::Object => data.is_object(),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire request: `{type, condition, data, context}`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterRequest {
    #[serde(rename = "type")]
    pub kind: FilterKind,

    pub condition: String,

    pub data: serde_json::Value,

    /// Input plus every prior step result keyed by raw step id
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl FilterRequest {
    pub fn new(kind: FilterKind, condition: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            condition: condition.into(),
            data,
            context: serde_json::Map::new(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Map<String, serde_json::Value>) -> Self {
        self.context = context;
        self
    }
}

/// Errors raised by a filter collaborator
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    /// Data does not have the shape the filter kind needs
    #[error("{message}")]
    InvalidInput { message: String },

    /// The language model call or its reply failed
    #[error("model error: {message}")]
    Model { message: String },

    /// A remote filter service answered with an error status
    #[error("filter service returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// Could not reach the remote filter service
    #[error("network error: {message}")]
    Network { message: String },

    /// Timed out waiting for the collaborator
    #[error("timeout after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// Could not decode a reply
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The collaborator could not be set up
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl FilterError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Interprets a natural-language condition over JSON data
#[async_trait]
pub trait FilterService: Send + Sync {
    /// Filter `request.data`, returning the filtered value
    async fn filter(&self, request: &FilterRequest) -> Result<serde_json::Value, FilterError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl FilterService for Box<dyn FilterService> {
    async fn filter(&self, request: &FilterRequest) -> Result<serde_json::Value, FilterError> {
        (**self).filter(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
