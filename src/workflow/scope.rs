//! Per-step execution namespace
//!
//! Expressions see the step input as `data` plus every earlier result under a
//! name derived from its step id. Each prior step also gets a kind alias
//! (`<kind>_<last '-' segment of id>`), so `transform-17` is reachable as both
//! `transform_17` and `transform_17_1`.

use super::state::ResultSet;
use crate::config::Step;
use crate::expr::Scope;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Name of the primary input binding
pub const INPUT_NAME: &str = "data";

/// Where a binding's value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// The step's own resolved input
    Input,
    /// A prior step's result, under its id
    Step(String),
    /// A prior step's result, under its kind alias
    Alias(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub source: BindingSource,
    pub value: Value,
}

/// Ordered, collision-free bindings for one step execution
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    bindings: Vec<Binding>,
}

impl Namespace {
    /// Bind `input` as `data` and each prior result in the order recorded
    pub fn build(input: &Value, prior: &ResultSet, steps: &HashMap<&str, &Step>) -> Self {
        let mut raw_keys: HashSet<String> = HashSet::from([INPUT_NAME.to_string()]);
        let mut used: HashSet<String> = HashSet::from([INPUT_NAME.to_string()]);
        let mut bindings = vec![Binding {
            name: INPUT_NAME.to_string(),
            source: BindingSource::Input,
            value: input.clone(),
        }];

        for (id, value) in prior.iter() {
            let Some(step) = steps.get(id) else {
                continue;
            };

            raw_keys.insert(id.to_string());
            bindings.push(Binding {
                name: unique_name(&sanitize(id), &mut used),
                source: BindingSource::Step(id.to_string()),
                value: value.clone(),
            });

            let alias = kind_alias(&step.kind, id);
            if raw_keys.insert(alias.clone()) {
                bindings.push(Binding {
                    name: unique_name(&sanitize(&alias), &mut used),
                    source: BindingSource::Alias(id.to_string()),
                    value: value.clone(),
                });
            }
        }

        Self { bindings }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    /// Filter collaborator context: `{ data, <raw step id>: result, ... }`
    ///
    /// Keys are raw ids, not sanitized names, and aliases are left out. A
    /// step whose id is literally `data` replaces the input entry.
    pub fn filter_context(&self) -> serde_json::Map<String, Value> {
        let mut context = serde_json::Map::new();
        for binding in &self.bindings {
            match &binding.source {
                BindingSource::Input => {
                    context.insert(INPUT_NAME.to_string(), binding.value.clone());
                }
                BindingSource::Step(id) => {
                    context.insert(id.clone(), binding.value.clone());
                }
                BindingSource::Alias(_) => {}
            }
        }
        context
    }
}

impl Scope for Namespace {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.name.as_str()).collect()
    }
}

/// Replace every character outside `[A-Za-z0-9_$]` with `_`
pub fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Claim `base`, or the first free `base_1`, `base_2`, ...
fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut counter = 1;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// `<kind>_<text after the last '-' in id>`
fn kind_alias(kind: &str, id: &str) -> String {
    let suffix = id.rsplit('-').next().unwrap_or(id);
    format!("{}_{}", kind, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::eval_str;
    use serde_json::json;

    fn build(input: Value, prior: &[(&Step, Value)]) -> Namespace {
        let steps: HashMap<&str, &Step> = prior.iter().map(|(s, _)| (s.id.as_str(), *s)).collect();
        let mut results = ResultSet::new();
        for (step, value) in prior {
            results.insert(step.id.clone(), value.clone());
        }
        Namespace::build(&input, &results, &steps)
    }

    fn names(ns: &Namespace) -> Vec<&str> {
        ns.bindings().iter().map(|b| b.name.as_str()).collect()
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("transform-1700000000000"), "transform_1700000000000");
        assert_eq!(sanitize("my step.v2"), "my_step_v2");
        assert_eq!(sanitize("$ok_1"), "$ok_1");
        assert_eq!(sanitize("héllo"), "h_llo");
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::from(["x".to_string(), "x_1".to_string()]);
        assert_eq!(unique_name("x", &mut used), "x_2");
        assert_eq!(unique_name("y", &mut used), "y");
        assert_eq!(unique_name("y", &mut used), "y_1");
    }

    #[test]
    fn test_kind_alias() {
        assert_eq!(kind_alias("http_request", "http_request-1700000000000"), "http_request_1700000000000");
        assert_eq!(kind_alias("filter", "plain"), "filter_plain");
        assert_eq!(kind_alias("filter", "a-b-c"), "filter_c");
    }

    #[test]
    fn test_transform_id_binding_and_collision() {
        let step = Step::new("transform-1700000000000", "transform");
        let ns = build(json!(5), &[(&step, json!({"x": 1}))]);

        assert_eq!(ns.get("data"), Some(&json!(5)));
        assert_eq!(ns.get("transform_1700000000000"), Some(&json!({"x": 1})));
        // The kind alias sanitizes to the same name and takes the next suffix
        assert_eq!(ns.get("transform_1700000000000_1"), Some(&json!({"x": 1})));
        assert_eq!(
            names(&ns),
            vec!["data", "transform_1700000000000", "transform_1700000000000_1"]
        );
    }

    #[test]
    fn test_step_named_data_does_not_shadow_input() {
        let step = Step::new("data", "http_request");
        let ns = build(json!("input"), &[(&step, json!("result"))]);

        assert_eq!(ns.get("data"), Some(&json!("input")));
        assert_eq!(ns.get("data_1"), Some(&json!("result")));
        assert_eq!(ns.get("http_request_data"), Some(&json!("result")));
    }

    #[test]
    fn test_alias_equal_to_earlier_raw_key_is_skipped() {
        // The second step's alias is the first step's raw id
        let first = Step::new("filter_7", "transform");
        let second = Step::new("x-7", "filter");
        let ns = build(json!(null), &[(&first, json!(1)), (&second, json!(2))]);

        assert_eq!(ns.get("filter_7"), Some(&json!(1)));
        assert_eq!(
            names(&ns),
            vec!["data", "filter_7", "transform_filter_7", "x_7"]
        );
    }

    #[test]
    fn test_bindings_never_overwrite() {
        let a = Step::new("a-1", "transform");
        let b = Step::new("a_1", "transform");
        let ns = build(json!(0), &[(&a, json!("first")), (&b, json!("second"))]);

        assert_eq!(ns.get("a_1"), Some(&json!("first")));
        assert_eq!(ns.get("a_1_1"), Some(&json!("second")));
        let unique: HashSet<&str> = names(&ns).into_iter().collect();
        assert_eq!(unique.len(), ns.bindings().len());
    }

    #[test]
    fn test_filter_context_uses_raw_ids() {
        let a = Step::new("http_request-1", "http_request");
        let b = Step::new("data", "transform");
        let ns = build(json!([1]), &[(&a, json!({"t": 1})), (&b, json!("over"))]);

        let context = ns.filter_context();
        assert_eq!(context.get("http_request-1"), Some(&json!({"t": 1})));
        assert!(!context.contains_key("http_request_1"));
        assert_eq!(context.get("data"), Some(&json!("over")));
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_namespace_is_an_expression_scope() {
        let step = Step::new("http_request-9", "http_request");
        let ns = build(json!(2), &[(&step, json!({"n": 40}))]);
        assert_eq!(eval_str("data + http_request_9.n", &ns).unwrap(), json!(42));
        assert_eq!(eval_str("http_request_9_1.n", &ns).unwrap(), json!(40));
    }
}
