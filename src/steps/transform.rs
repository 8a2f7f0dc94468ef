//! Transform step: expression, condition, or identity

use super::types::{StepError, StepExecutor, TransformMode};
use crate::config::Step;
use crate::expr;
use crate::workflow::Namespace;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransformConfig {
    expression: Option<String>,

    condition: Option<String>,

    /// `Some(Null)` when given as `null`, `None` when absent
    #[serde(default, deserialize_with = "present")]
    true_value: Option<Value>,

    #[serde(default, deserialize_with = "present")]
    false_value: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Blank text counts as not configured
fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

/// Evaluates an expression over the namespace, or picks between two
/// configured values by a condition; otherwise passes the input through
pub struct TransformExecutor;

#[async_trait]
impl StepExecutor for TransformExecutor {
    async fn execute(
        &self,
        step: &Step,
        input: &Value,
        namespace: &Namespace,
    ) -> Result<Value, StepError> {
        let config: TransformConfig = match &step.config {
            Value::Null => TransformConfig::default(),
            value => TransformConfig::deserialize(value)
                .map_err(|e| StepError::invalid_config(e.to_string()))?,
        };

        if let Some(expression) = non_blank(&config.expression) {
            return expr::eval_str(expression, namespace)
                .map_err(|e| StepError::transform(TransformMode::Expression, e));
        }

        if let (Some(condition), Some(true_value), Some(false_value)) = (
            non_blank(&config.condition),
            config.true_value,
            config.false_value,
        ) {
            let holds = expr::eval_condition(condition, namespace)
                .map_err(|e| StepError::transform(TransformMode::Condition, e))?;
            return Ok(if holds { true_value } else { false_value });
        }

        Ok(input.clone())
    }
}
