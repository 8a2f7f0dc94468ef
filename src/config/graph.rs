//! Workflow graph model and graph document loading
//!
//! Two document shapes are accepted:
//! - native: `{ "steps": [{id, kind, label, config}], "connections": [{from, to}] }`
//! - editor: `{ "nodes": [{id, type, data: {label, config}}], "edges": [{source, target}] }`
//!
//! Either may be written as JSON or (native only, in practice) TOML.

use crate::expr;
use crate::filter::FilterKind;
use crate::steps::StepKind;
use crate::workflow::Schedule;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A unit of work in the graph
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Unique within the graph
    pub id: String,

    /// Step kind name; checked at dispatch time
    pub kind: String,

    #[serde(default)]
    pub label: String,

    /// Kind-specific settings
    #[serde(default = "empty_config")]
    pub config: serde_json::Value,
}

fn empty_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Step {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            kind: kind.into(),
            config: empty_config(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Look up a config field
    pub fn config_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.config.get(key)
    }

    /// Look up a config field that holds a string
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key).and_then(|v| v.as_str())
    }
}

/// Directed edge: `to` consumes the result of `from`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Steps plus connections, as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Graph {
    pub steps: Vec<Step>,

    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// Editor document shape; layout fields are ignored
#[derive(Debug, Deserialize)]
struct EditorDocument {
    nodes: Vec<EditorNode>,
    #[serde(default)]
    edges: Vec<EditorEdge>,
}

#[derive(Debug, Deserialize)]
struct EditorNode {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: EditorNodeData,
}

#[derive(Debug, Default, Deserialize)]
struct EditorNodeData {
    #[serde(default)]
    label: String,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EditorEdge {
    source: String,
    target: String,
}

impl From<EditorDocument> for Graph {
    fn from(doc: EditorDocument) -> Self {
        let steps = doc
            .nodes
            .into_iter()
            .map(|node| Step {
                id: node.id,
                kind: node.kind,
                label: node.data.label,
                config: node.data.config.unwrap_or_else(empty_config),
            })
            .collect();

        let connections = doc
            .edges
            .into_iter()
            .map(|edge| Connection::new(edge.source, edge.target))
            .collect();

        Graph { steps, connections }
    }
}

impl Graph {
    pub fn new(steps: Vec<Step>, connections: Vec<Connection>) -> Self {
        Self { steps, connections }
    }

    /// Build a graph from either document shape
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let mut graph: Graph = if value.get("steps").is_some() {
            serde_json::from_value(value).context("invalid graph document")?
        } else if value.get("nodes").is_some() {
            let doc: EditorDocument =
                serde_json::from_value(value).context("invalid editor document")?;
            doc.into()
        } else {
            anyhow::bail!("graph document needs either 'steps' or 'nodes'");
        };

        for step in &mut graph.steps {
            lift_headers_json(&mut step.config);
        }
        Ok(graph)
    }

    /// Look up a step by id
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Report every structural problem at once
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.steps.is_empty() {
            errors.push("graph has no steps".to_string());
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(step.id.as_str()) {
                errors.push(format!("duplicate step id: {}", step.id));
            }
        }

        for conn in &self.connections {
            for endpoint in [&conn.from, &conn.to] {
                if !seen_ids.contains(endpoint.as_str()) {
                    errors.push(format!(
                        "connection {} -> {} references unknown step '{}'",
                        conn.from, conn.to, endpoint
                    ));
                }
            }
        }

        for step in &self.steps {
            match StepKind::parse(&step.kind) {
                None => errors.push(format!(
                    "step '{}' has unknown kind '{}'",
                    step.id, step.kind
                )),
                Some(StepKind::HttpRequest) => {
                    if step.config_str("url").is_none_or(|url| url.is_empty()) {
                        errors.push(format!("http_request step '{}' missing 'url'", step.id));
                    }
                }
                Some(StepKind::Filter) => {
                    let has_condition = step.config_str("condition").is_some_and(|c| !c.is_empty());
                    let kind = step.config_value("type").filter(|k| !k.is_null());
                    if let Some(kind) = kind.filter(|_| has_condition) {
                        let known = kind.as_str().and_then(FilterKind::parse).is_some();
                        if !known {
                            errors.push(format!(
                                "filter step '{}' has invalid type {}",
                                step.id, kind
                            ));
                        }
                    }
                }
                Some(StepKind::Transform) => {
                    for field in ["expression", "condition"] {
                        let Some(source) = step.config_str(field) else {
                            continue;
                        };
                        if source.trim().is_empty() {
                            continue;
                        }
                        if let Err(e) = expr::parse(source) {
                            errors.push(format!(
                                "transform step '{}' {}: {}",
                                step.id, field, e
                            ));
                        }
                    }
                }
            }
        }

        // Ordering is only meaningful once the structure is sound
        if errors.is_empty() {
            if let Err(e) = Schedule::build(self) {
                errors.push(e.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// The editor stores headers as raw JSON text next to the parsed map
fn lift_headers_json(config: &mut serde_json::Value) {
    let Some(map) = config.as_object_mut() else {
        return;
    };
    if map.contains_key("headers") {
        return;
    }
    let parsed = map
        .get("headersJson")
        .and_then(|v| v.as_str())
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .filter(|v| v.is_object());
    if let Some(headers) = parsed {
        map.insert("headers".into(), headers);
    }
}

/// Load a graph document from a JSON or TOML file
pub fn load_graph(path: &Path) -> Result<Graph> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = Path::new(&expanded);

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?
        }
        _ => serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?,
    };

    Graph::from_value(value).with_context(|| format!("loading graph {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn http(id: &str, url: &str) -> Step {
        Step::new(id, "http_request").with_config(json!({"url": url}))
    }

    #[test]
    fn test_native_document() {
        let graph = Graph::from_value(json!({
            "steps": [
                {"id": "a", "kind": "http_request", "label": "Fetch", "config": {"url": "http://x"}},
                {"id": "b", "kind": "transform"}
            ],
            "connections": [{"from": "a", "to": "b"}]
        }))
        .unwrap();

        assert_eq!(graph.steps.len(), 2);
        assert_eq!(graph.steps[0].label, "Fetch");
        assert_eq!(graph.steps[1].config, json!({}));
        assert_eq!(graph.connections, vec![Connection::new("a", "b")]);
    }

    #[test]
    fn test_editor_document() {
        let graph = Graph::from_value(json!({
            "nodes": [
                {
                    "id": "http_request-1",
                    "type": "http_request",
                    "position": {"x": 10, "y": 20},
                    "data": {
                        "label": "Weather",
                        "config": {"url": "http://w", "headersJson": "{\"Accept\": \"application/json\"}"}
                    }
                },
                {"id": "filter-2", "type": "filter", "data": {"label": "Keep"}}
            ],
            "edges": [{"id": "e1", "source": "http_request-1", "target": "filter-2"}]
        }))
        .unwrap();

        assert_eq!(graph.steps[0].kind, "http_request");
        assert_eq!(graph.steps[0].label, "Weather");
        assert_eq!(
            graph.steps[0].config_value("headers"),
            Some(&json!({"Accept": "application/json"}))
        );
        assert_eq!(graph.steps[1].config, json!({}));
        assert_eq!(
            graph.connections,
            vec![Connection::new("http_request-1", "filter-2")]
        );
    }

    #[test]
    fn test_explicit_headers_win_over_headers_json() {
        let graph = Graph::from_value(json!({
            "steps": [{
                "id": "a",
                "kind": "http_request",
                "config": {"url": "u", "headers": {"X": "1"}, "headersJson": "{\"Y\": \"2\"}"}
            }]
        }))
        .unwrap();
        assert_eq!(graph.steps[0].config_value("headers"), Some(&json!({"X": "1"})));
    }

    #[test]
    fn test_unrecognised_document() {
        assert!(Graph::from_value(json!({"things": []})).is_err());
    }

    #[test]
    fn test_validate_ok() {
        let graph = Graph::new(
            vec![
                http("a", "http://x"),
                Step::new("b", "transform").with_config(json!({"expression": "data.items"})),
                Step::new("c", "filter").with_config(json!({"type": "array", "condition": "warm"})),
            ],
            vec![Connection::new("a", "b"), Connection::new("b", "c")],
        );
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let graph = Graph::new(
            vec![
                http("a", ""),
                Step::new("a", "transform"),
                Step::new("t", "transform").with_config(json!({"expression": "data +"})),
                Step::new("f", "filter").with_config(json!({"type": "list", "condition": "warm"})),
                Step::new("g", "filter").with_config(json!({"type": "list"})),
                Step::new("x", "webhook"),
            ],
            vec![Connection::new("a", "ghost")],
        );

        let errors = graph.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("duplicate step id: a")));
        assert!(errors.iter().any(|e| e.contains("unknown step 'ghost'")));
        assert!(errors.iter().any(|e| e.contains("missing 'url'")));
        assert!(errors.iter().any(|e| e.contains("transform step 't' expression")));
        assert!(errors.iter().any(|e| e.contains("filter step 'f' has invalid type")));
        assert!(!errors.iter().any(|e| e.contains("filter step 'g'")));
        assert!(errors.iter().any(|e| e.contains("unknown kind 'webhook'")));
    }

    #[test]
    fn test_validate_reports_overlong_expression() {
        let graph = Graph::new(
            vec![Step::new("t", "transform")
                .with_config(json!({"expression": format!("data{}", ".x".repeat(10_000))}))],
            vec![],
        );
        let errors = graph.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("nested too deeply"));
    }

    #[test]
    fn test_validate_reports_cycles() {
        let graph = Graph::new(
            vec![Step::new("a", "transform"), Step::new("b", "transform")],
            vec![Connection::new("a", "b"), Connection::new("b", "a")],
        );
        let errors = graph.validate().unwrap_err();
        assert!(errors[0].contains("cycle"));
    }

    #[test]
    fn test_validate_empty_graph() {
        let errors = Graph::default().validate().unwrap_err();
        assert_eq!(errors, vec!["graph has no steps".to_string()]);
    }

    #[test]
    fn test_load_graph_json_and_toml() {
        let dir = TempDir::new().unwrap();

        let json_path = dir.path().join("graph.json");
        std::fs::write(
            &json_path,
            r#"{"steps": [{"id": "a", "kind": "transform", "label": "A"}]}"#,
        )
        .unwrap();
        assert_eq!(load_graph(&json_path).unwrap().steps[0].id, "a");

        let toml_path = dir.path().join("graph.toml");
        std::fs::write(
            &toml_path,
            r#"
            [[steps]]
            id = "fetch"
            kind = "http_request"
            label = "Fetch"
            config = { url = "http://example.com", method = "GET" }

            [[steps]]
            id = "shape"
            kind = "transform"
            config = { expression = "data.items" }

            [[connections]]
            from = "fetch"
            to = "shape"
        "#,
        )
        .unwrap();
        let graph = load_graph(&toml_path).unwrap();
        assert_eq!(graph.steps.len(), 2);
        assert_eq!(graph.steps[0].config_str("url"), Some("http://example.com"));
        assert_eq!(graph.connections.len(), 1);
    }

    #[test]
    fn test_load_graph_missing_file() {
        let err = load_graph(Path::new("/nonexistent/graph.json")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
