//! Core types and trait for step execution

use crate::config::Step;
use crate::expr::ExprError;
use crate::filter::{FilterError, FilterKind};
use crate::transport::TransportError;
use crate::workflow::Namespace;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// The closed set of step kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    HttpRequest,
    Transform,
    Filter,
}

impl StepKind {
    /// Parse a graph kind name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "http_request" => Some(Self::HttpRequest),
            "transform" => Some(Self::Transform),
            "filter" => Some(Self::Filter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HttpRequest => "http_request",
            Self::Transform => "transform",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of a transform failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Expression,
    Condition,
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression => f.write_str("expression"),
            Self::Condition => f.write_str("condition"),
        }
    }
}

/// Why a single step failed
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// A required config field is absent
    #[error("'{field}' is required for {kind} steps")]
    MissingConfig { kind: StepKind, field: String },

    /// A config field has an unusable value
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The outbound request failed or returned an error status
    #[error("HTTP request failed: {0}")]
    Transport(#[from] TransportError),

    /// Expression or condition evaluation failed
    #[error("Transform {mode} error: {source}")]
    Transform {
        mode: TransformMode,
        #[source]
        source: ExprError,
    },

    /// Filter input is not the declared shape
    #[error("Input data is not an {expected} (got {actual})")]
    TypeMismatch {
        expected: FilterKind,
        actual: &'static str,
    },

    /// The filter collaborator failed
    #[error("Filter execution failed: {0}")]
    Filter(#[from] FilterError),
}

impl StepError {
    /// Create a missing config error
    pub fn missing_config(kind: StepKind, field: impl Into<String>) -> Self {
        Self::MissingConfig {
            kind,
            field: field.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a transform error
    pub fn transform(mode: TransformMode, source: ExprError) -> Self {
        Self::Transform { mode, source }
    }
}

/// JSON type name for error messages
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Behavior for one step kind
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run a step against its resolved input and namespace
    async fn execute(
        &self,
        step: &Step,
        input: &serde_json::Value,
        namespace: &Namespace,
    ) -> Result<serde_json::Value, StepError>;
}

#[async_trait]
impl StepExecutor for Box<dyn StepExecutor> {
    async fn execute(
        &self,
        step: &Step,
        input: &serde_json::Value,
        namespace: &Namespace,
    ) -> Result<serde_json::Value, StepError> {
        (**self).execute(step, input, namespace).await
    }
}
