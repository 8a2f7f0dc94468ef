//! Input resolution from upstream results

use super::schedule::Dependencies;
use super::state::ResultSet;
use serde_json::Value;

/// Gather a step's input from its producers
///
/// - no producers: `null`
/// - one producer: its result as-is (`null` if it is not a step)
/// - several producers: `{ producerId: result }`, leaving out ids that are
///   not steps of the graph
pub fn resolve_input(id: &str, dependencies: &Dependencies, results: &ResultSet) -> Value {
    match dependencies.producers(id) {
        [] => Value::Null,
        [only] => results.get(only).cloned().unwrap_or(Value::Null),
        many => {
            let merged = many
                .iter()
                .filter(|p| dependencies.is_step(p))
                .map(|p| (p.clone(), results.get(p).cloned().unwrap_or(Value::Null)))
                .collect();
            Value::Object(merged)
        }
    }
}
