//! Prompt templates for model-backed filtering

use super::types::{FilterError, FilterKind, FilterRequest};
use minijinja::{Environment, context};

pub const ARRAY_SYSTEM_PROMPT: &str = "You are a helpful assistant that filters arrays based on natural language conditions. Always return valid JSON arrays only. You can reference data from the context when evaluating the condition.";

pub const OBJECT_SYSTEM_PROMPT: &str = "You are a helpful assistant that removes fields from objects based on natural language conditions. Always return valid JSON objects only.";

const ARRAY_TEMPLATE: &str = "\
You are a data filtering assistant. Given an array of items and a natural language condition, return only the items that match the condition.

Condition: {{ condition }}

Array of items to filter:
{{ data }}{% if context %}

Additional context from other workflow nodes:
{{ context }}{% endif %}

Return a JSON array containing only the items that match the condition. Do not include any explanation, only return the filtered array.";

const OBJECT_TEMPLATE: &str = "\
You are a data filtering assistant. Given an object and a natural language condition describing which fields to remove, return the object with those fields removed.

Condition: {{ condition }}

Object:
{{ data }}{% if context %}

Additional context from other workflow nodes:
{{ context }}{% endif %}

Return the object as JSON with the specified fields removed. Do not include any explanation, only return the modified object.";

/// Renders the user prompt for a filter request
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, FilterError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        env.add_template("array", ARRAY_TEMPLATE)
            .map_err(|e| FilterError::config(format!("array prompt: {}", e)))?;
        env.add_template("object", OBJECT_TEMPLATE)
            .map_err(|e| FilterError::config(format!("object prompt: {}", e)))?;
        Ok(Self { env })
    }

    /// System prompt for a filter kind
    pub fn system_prompt(kind: FilterKind) -> &'static str {
        match kind {
            FilterKind::Array => ARRAY_SYSTEM_PROMPT,
            FilterKind::Object => OBJECT_SYSTEM_PROMPT,
        }
    }

    /// Render the user prompt; the context section is omitted when empty
    pub fn render(&self, request: &FilterRequest) -> Result<String, FilterError> {
        let data = pretty(&request.data)?;
        let context_text = if request.context.is_empty() {
            String::new()
        } else {
            pretty(&serde_json::Value::Object(request.context.clone()))?
        };

        let template = self
            .env
            .get_template(request.kind.as_str())
            .map_err(|e| FilterError::config(e.to_string()))?;

        template
            .render(context! {
                condition => request.condition.as_str(),
                data => data,
                context => context_text,
            })
            .map_err(|e| FilterError::config(format!("rendering prompt: {}", e)))
    }
}

fn pretty(value: &serde_json::Value) -> Result<String, FilterError> {
    serde_json::to_string_pretty(value).map_err(|e| FilterError::parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_prompt_without_context() {
        let renderer = PromptRenderer::new().unwrap();
        let request = FilterRequest::new(FilterKind::Array, "warm clothes", json!(["dress"]));
        let prompt = renderer.render(&request).unwrap();

        assert!(prompt.starts_with("You are a data filtering assistant. Given an array"));
        assert!(prompt.contains("Condition: warm clothes"));
        assert!(prompt.contains("[\n  \"dress\"\n]"));
        assert!(!prompt.contains("Additional context"));
        assert!(prompt.ends_with("only return the filtered array."));
    }

    #[test]
    fn test_object_prompt_with_context() {
        let renderer = PromptRenderer::new().unwrap();
        let mut context = serde_json::Map::new();
        context.insert("weather-1".into(), json!({"temp": 30}));
        let request = FilterRequest::new(FilterKind::Object, "drop ids", json!({"id": 1}))
            .with_context(context);
        let prompt = renderer.render(&request).unwrap();

        assert!(prompt.contains("describing which fields to remove"));
        assert!(prompt.contains("Additional context from other workflow nodes:"));
        assert!(prompt.contains("\"weather-1\""));
    }

    #[test]
    fn test_condition_is_not_html_escaped() {
        let renderer = PromptRenderer::new().unwrap();
        let request = FilterRequest::new(FilterKind::Array, "price < 10 & \"cheap\"", json!([]));
        let prompt = renderer.render(&request).unwrap();
        assert!(prompt.contains("Condition: price < 10 & \"cheap\""));
    }
}
