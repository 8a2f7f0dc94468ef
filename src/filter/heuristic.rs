//! Keyword fallback used when no language model is available

use tracing::warn;

const WARM_TRIGGERS: &[&str] = &["summer", "warm"];
const WARM_KEYWORDS: &[&str] = &["summer", "warm", "short", "t-shirt", "dress"];

const COLD_TRIGGERS: &[&str] = &["winter", "cold"];
const COLD_KEYWORDS: &[&str] = &["winter", "cold", "jacket", "sweater", "coat"];

/// Filter array items by the seasonal keyword families
///
/// Matching runs against each item's serialized, lower-cased JSON text.
/// Conditions that name neither family keep every item.
pub fn filter_array(items: &[serde_json::Value], condition: &str) -> Vec<serde_json::Value> {
    let condition = condition.to_lowercase();

    let keywords = if WARM_TRIGGERS.iter().any(|t| condition.contains(t)) {
        WARM_KEYWORDS
    } else if COLD_TRIGGERS.iter().any(|t| condition.contains(t)) {
        COLD_KEYWORDS
    } else {
        warn!(%condition, "could not interpret filter condition, returning all items");
        return items.to_vec();
    };

    items
        .iter()
        .filter(|item| {
            let text = serde_json::to_string(item)
                .unwrap_or_default()
                .to_lowercase();
            keywords.iter().any(|k| text.contains(k))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: serde_json::Value) -> Vec<serde_json::Value> {
        value.as_array().cloned().unwrap()
    }

    #[test]
    fn test_summer_condition() {
        let data = items(json!(["a warm dress", "a wool coat"]));
        assert_eq!(filter_array(&data, "summer"), vec![json!("a warm dress")]);
    }

    #[test]
    fn test_warm_matches_object_items_case_insensitively() {
        let data = items(json!([
            {"name": "Linen SHORTS", "price": 20},
            {"name": "Parka", "price": 200},
            {"name": "T-Shirt"}
        ]));
        let kept = filter_array(&data, "Show me WARM weather clothes");
        assert_eq!(kept, vec![json!({"name": "Linen SHORTS", "price": 20}), json!({"name": "T-Shirt"})]);
    }

    #[test]
    fn test_winter_condition() {
        let data = items(json!(["sweater", "sandals", "rain jacket", "cold brew"]));
        assert_eq!(
            filter_array(&data, "only winter gear"),
            vec![json!("sweater"), json!("rain jacket"), json!("cold brew")]
        );
    }

    #[test]
    fn test_warm_family_takes_priority() {
        // Mentions both families; the warm family is checked first
        let data = items(json!(["coat", "dress"]));
        assert_eq!(filter_array(&data, "warm or cold"), vec![json!("dress")]);
    }

    #[test]
    fn test_uninterpretable_condition_keeps_all() {
        let data = items(json!([1, 2, 3]));
        assert_eq!(filter_array(&data, "only even numbers"), data);
    }

    #[test]
    fn test_keys_count_toward_match() {
        // Serialized text includes field names
        let data = items(json!([{"summer": false}, {"x": 1}]));
        assert_eq!(filter_array(&data, "summer"), vec![json!({"summer": false})]);
    }
}
