//! Run results

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

/// Step results keyed by step id, in the order they were recorded
///
/// Each id is written once; later writes for the same id are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    values: HashMap<String, serde_json::Value>,
    order: Vec<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result; returns false if the step already has one
    pub fn insert(&mut self, id: impl Into<String>, value: serde_json::Value) -> bool {
        let id = id.into();
        if self.values.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.values.insert(id, value);
        true
    }

    pub fn get(&self, id: &str) -> Option<&serde_json::Value> {
        self.values.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Results in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.order
            .iter()
            .map(|id| (id.as_str(), &self.values[id]))
    }

    /// Copy of the results for `ids`, recorded in the order given
    pub fn snapshot<'a>(&self, ids: impl IntoIterator<Item = &'a String>) -> Self {
        let mut snapshot = Self::new();
        for id in ids {
            if let Some(value) = self.values.get(id) {
                snapshot.insert(id.clone(), value.clone());
            }
        }
        snapshot
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for (id, value) in self.iter() {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_never_overwrites() {
        let mut results = ResultSet::new();
        assert!(results.insert("a", json!(1)));
        assert!(!results.insert("a", json!(2)));
        assert_eq!(results.get("a"), Some(&json!(1)));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut results = ResultSet::new();
        results.insert("zeta", json!(null));
        results.insert("alpha", json!([1]));
        results.insert("mid", json!("x"));

        let ids: Vec<&str> = results.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            serde_json::to_string(&results).unwrap(),
            r#"{"zeta":null,"alpha":[1],"mid":"x"}"#
        );
    }

    #[test]
    fn test_snapshot_reorders_and_skips_missing() {
        let mut results = ResultSet::new();
        results.insert("b", json!(2));
        results.insert("a", json!(1));

        let wanted = vec!["a".to_string(), "missing".to_string(), "b".to_string()];
        let snapshot = results.snapshot(&wanted);
        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_null_result_is_present() {
        let mut results = ResultSet::new();
        results.insert("a", json!(null));
        assert!(results.contains("a"));
        assert!(!results.is_empty());
    }
}
