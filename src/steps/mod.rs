//! Step executors
//!
//! One executor per step kind, all behind [`StepExecutor`]:
//! - `http_request`: calls the HTTP collaborator
//! - `transform`: evaluates an expression or condition over the namespace
//! - `filter`: delegates a natural-language condition to the filter service
//!
//! Executors never look at the environment; their collaborators are handed
//! in at construction.

mod filter;
mod http_request;
mod transform;
mod types;

pub use filter::FilterExecutor;
pub use http_request::HttpRequestExecutor;
pub use transform::TransformExecutor;
#[allow(unused_imports)]
pub use types::{StepError, StepExecutor, StepKind, TransformMode, json_type_name};

use crate::filter::FilterService;
use crate::transport::HttpTransport;
use std::sync::Arc;

/// The executor for each step kind
pub struct StepExecutors {
    http: HttpRequestExecutor,
    transform: TransformExecutor,
    filter: FilterExecutor,
}

impl StepExecutors {
    pub fn new(transport: Arc<dyn HttpTransport>, filter: Arc<dyn FilterService>) -> Self {
        Self {
            http: HttpRequestExecutor::new(transport),
            transform: TransformExecutor,
            filter: FilterExecutor::new(filter),
        }
    }

    /// Dispatch by kind
    pub fn for_kind(&self, kind: StepKind) -> &dyn StepExecutor {
        match kind {
            StepKind::HttpRequest => &self.http,
            StepKind::Transform => &self.transform,
            StepKind::Filter => &self.filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Step;
    use crate::filter::LocalFilter;
    use crate::transport::{HttpRequest, HttpResponse, TransportError};
    use crate::workflow::{Namespace, ResultSet};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    struct EchoTransport;

    #[async_trait]
    impl HttpTransport for EchoTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(200, json!({"url": request.url})))
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let executors = StepExecutors::new(
            Arc::new(EchoTransport),
            Arc::new(LocalFilter::new().unwrap()),
        );
        let input = json!(41);
        let namespace = Namespace::build(&input, &ResultSet::new(), &HashMap::new());

        let step = Step::new("h", "http_request").with_config(json!({"url": "http://x.test/a"}));
        let result = executors
            .for_kind(StepKind::HttpRequest)
            .execute(&step, &input, &namespace)
            .await
            .unwrap();
        assert_eq!(result, json!({"url": "http://x.test/a"}));

        let step = Step::new("t", "transform").with_config(json!({"expression": "data + 1"}));
        let result = executors
            .for_kind(StepKind::Transform)
            .execute(&step, &input, &namespace)
            .await
            .unwrap();
        assert_eq!(result, json!(42));

        let step = Step::new("f", "filter").with_config(json!({"condition": "warm"}));
        let err = executors
            .for_kind(StepKind::Filter)
            .execute(&step, &input, &namespace)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Input data is not an array (got number)");
    }
}
