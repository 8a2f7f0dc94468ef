//! Filter step: delegates a natural-language condition to the filter service

use super::types::{StepError, StepExecutor, json_type_name};
use crate::config::Step;
use crate::filter::{FilterKind, FilterRequest, FilterService};
use crate::workflow::Namespace;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct FilterExecutor {
    service: Arc<dyn FilterService>,
}

impl FilterExecutor {
    pub fn new(service: Arc<dyn FilterService>) -> Self {
        Self { service }
    }
}

fn filter_kind(step: &Step) -> Result<FilterKind, StepError> {
    match step.config_value("type") {
        None | Some(Value::Null) => Ok(FilterKind::Array),
        Some(Value::String(name)) => FilterKind::parse(name)
            .ok_or_else(|| StepError::invalid_config(format!("invalid filter type '{}'", name))),
        Some(other) => Err(StepError::invalid_config(format!(
            "filter type must be a string, got {}",
            other
        ))),
    }
}

#[async_trait]
impl StepExecutor for FilterExecutor {
    async fn execute(
        &self,
        step: &Step,
        input: &Value,
        namespace: &Namespace,
    ) -> Result<Value, StepError> {
        let condition = match step.config_value("condition") {
            Some(Value::String(c)) if !c.is_empty() => c.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => return Ok(input.clone()),
            Some(other) => {
                return Err(StepError::invalid_config(format!(
                    "condition must be a string, got {}",
                    other
                )));
            }
        };

        let kind = filter_kind(step)?;
        if !kind.accepts(input) {
            return Err(StepError::TypeMismatch {
                expected: kind,
                actual: json_type_name(input),
            });
        }

        let request = FilterRequest::new(kind, condition, input.clone())
            .with_context(namespace.filter_context());

        debug!(step = %step.id, service = self.service.name(), %kind, "delegating filter");
        Ok(self.service.filter(&request).await?)
    }
}
