//! In-process filter: language model when available, keyword fallback otherwise

use super::heuristic;
use super::llm::ChatModel;
use super::prompt::PromptRenderer;
use super::types::{FilterError, FilterKind, FilterRequest, FilterService};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

pub struct LocalFilter {
    model: Option<Box<dyn ChatModel>>,
    prompts: PromptRenderer,
}

impl LocalFilter {
    /// Filter without a model; always uses the fallback
    pub fn new() -> Result<Self, FilterError> {
        Ok(Self {
            model: None,
            prompts: PromptRenderer::new()?,
        })
    }

    /// Attach a chat model
    pub fn with_model(mut self, model: Box<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    async fn ask_model(
        &self,
        model: &dyn ChatModel,
        request: &FilterRequest,
    ) -> Result<serde_json::Value, FilterError> {
        let prompt = self.prompts.render(request)?;
        let reply = model
            .complete(PromptRenderer::system_prompt(request.kind), &prompt)
            .await?;

        let value = extract_json(request.kind, reply.trim())?;
        if !request.kind.accepts(&value) {
            return Err(FilterError::model(format!(
                "model returned JSON that is not an {}",
                request.kind
            )));
        }
        Ok(value)
    }
}

#[async_trait]
impl FilterService for LocalFilter {
    async fn filter(&self, request: &FilterRequest) -> Result<serde_json::Value, FilterError> {
        let not_shaped = match request.kind {
            FilterKind::Array => "Input data is not an array",
            FilterKind::Object => "Input data is not an object",
        };
        if !request.kind.accepts(&request.data) {
            return Err(FilterError::invalid_input(not_shaped));
        }

        if let Some(ref model) = self.model {
            match self.ask_model(model.as_ref(), request).await {
                Ok(value) => {
                    debug!(model = model.name(), kind = %request.kind, "filtered with model");
                    return Ok(value);
                }
                Err(e) => warn!(model = model.name(), error = %e, "model filter failed, using fallback"),
            }
        }

        Ok(match (&request.kind, &request.data) {
            (FilterKind::Array, serde_json::Value::Array(items)) => {
                serde_json::Value::Array(heuristic::filter_array(items, &request.condition))
            }
            _ => request.data.clone(),
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Pull the outermost JSON array or object out of a model reply
fn extract_json(kind: FilterKind, reply: &str) -> Result<serde_json::Value, FilterError> {
    let pattern = match kind {
        FilterKind::Array => r"\[[\s\S]*\]",
        FilterKind::Object => r"\{[\s\S]*\}",
    };
    let re = Regex::new(pattern).map_err(|e| FilterError::parse(e.to_string()))?;

    let candidate = re.find(reply).map(|m| m.as_str()).unwrap_or(reply);
    serde_json::from_str(candidate)
        .map_err(|e| FilterError::parse(format!("model reply is not JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Mock model that replays a fixed reply and records prompts
    struct MockModel {
        reply: Result<String, FilterError>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl MockModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(FilterError::network("connection refused")),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn complete(&self, system: &str, user: &str) -> Result<String, FilterError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_fallback_without_model() {
        let filter = LocalFilter::new().unwrap();
        let request = FilterRequest::new(FilterKind::Array, "summer", json!(["a warm dress", "a wool coat"]));
        assert_eq!(filter.filter(&request).await.unwrap(), json!(["a warm dress"]));
    }

    #[tokio::test]
    async fn test_object_without_model_is_unchanged() {
        let filter = LocalFilter::new().unwrap();
        let request = FilterRequest::new(FilterKind::Object, "remove ids", json!({"id": 1, "name": "x"}));
        assert_eq!(filter.filter(&request).await.unwrap(), json!({"id": 1, "name": "x"}));
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let filter = LocalFilter::new().unwrap();

        let err = filter
            .filter(&FilterRequest::new(FilterKind::Array, "warm", json!({"a": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Input data is not an array");

        let err = filter
            .filter(&FilterRequest::new(FilterKind::Object, "x", json!([1])))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Input data is not an object");
    }

    #[tokio::test]
    async fn test_model_reply_with_prose_is_extracted() {
        let filter = LocalFilter::new()
            .unwrap()
            .with_model(Box::new(MockModel::replying("Here you go:\n[\"linen shirt\"]\nEnjoy!")));
        let request = FilterRequest::new(FilterKind::Array, "breathable", json!(["linen shirt", "parka"]));
        assert_eq!(filter.filter(&request).await.unwrap(), json!(["linen shirt"]));
    }

    #[tokio::test]
    async fn test_model_object_reply() {
        let filter = LocalFilter::new()
            .unwrap()
            .with_model(Box::new(MockModel::replying("{\"name\": \"x\"}")));
        let request = FilterRequest::new(FilterKind::Object, "remove ids", json!({"id": 1, "name": "x"}));
        assert_eq!(filter.filter(&request).await.unwrap(), json!({"name": "x"}));
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let filter = LocalFilter::new()
            .unwrap()
            .with_model(Box::new(MockModel::failing()));
        let request = FilterRequest::new(FilterKind::Array, "summer", json!(["a warm dress", "a wool coat"]));
        assert_eq!(filter.filter(&request).await.unwrap(), json!(["a warm dress"]));
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let filter = LocalFilter::new()
            .unwrap()
            .with_model(Box::new(MockModel::replying("I cannot do that")));
        let request = FilterRequest::new(FilterKind::Array, "cold", json!(["coat", "sandals"]));
        assert_eq!(filter.filter(&request).await.unwrap(), json!(["coat"]));
    }

    #[tokio::test]
    async fn test_model_receives_rendered_prompts() {
        let model = std::sync::Arc::new(MockModel::replying("[]"));

        struct Shared(std::sync::Arc<MockModel>);

        #[async_trait]
        impl ChatModel for Shared {
            async fn complete(&self, system: &str, user: &str) -> Result<String, FilterError> {
                self.0.complete(system, user).await
            }

            fn name(&self) -> &str {
                "shared"
            }
        }

        let filter = LocalFilter::new()
            .unwrap()
            .with_model(Box::new(Shared(model.clone())));
        let request = FilterRequest::new(FilterKind::Array, "cheap items", json!([{"price": 1}]));
        filter.filter(&request).await.unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("filters arrays"));
        assert!(prompts[0].1.contains("Condition: cheap items"));
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(
            extract_json(FilterKind::Array, "```json\n[1, 2]\n```").unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            extract_json(FilterKind::Object, "result: {\"a\": {\"b\": 1}}").unwrap(),
            json!({"a": {"b": 1}})
        );
        assert!(extract_json(FilterKind::Array, "nothing here").is_err());
    }
}
