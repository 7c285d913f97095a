//! Condition evaluation against trigger payloads.
//!
//! Conditions are pure: they read the payload through a dot-separated
//! field path and never touch stores or clocks. Evaluation fails closed,
//! so an unknown operator or an unusable value yields `false` rather
//! than an error.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Comparison operators available to condition nodes.
///
/// Operators unknown to this version deserialize to `Unknown` and
/// evaluate to `false`, so definitions saved by a newer builder do not
/// fail whole runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    IsTrue,
    IsFalse,
    #[serde(other, skip_serializing)]
    Unknown,
}

/// Configuration for condition nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Dot-separated path into the trigger payload, e.g. `booking.type`.
    pub field: String,
    pub operator: ConditionOperator,
    /// Comparison operand; unused by the unary operators.
    #[serde(default)]
    pub value: JsonValue,
}

impl ConditionConfig {
    /// Evaluates this condition against a trigger payload.
    ///
    /// `equals`/`not_equals` and `is_empty`/`is_not_empty` are exact
    /// negations of each other for every input, including a missing
    /// field. The remaining operators treat a missing or unusable
    /// field as `false`.
    #[must_use]
    pub fn evaluate(&self, payload: &JsonValue) -> bool {
        let field = lookup(payload, &self.field);

        match self.operator {
            ConditionOperator::Equals => equals(field, &self.value),
            ConditionOperator::NotEquals => !equals(field, &self.value),
            ConditionOperator::Contains => contains(field, &self.value),
            ConditionOperator::NotContains => !contains(field, &self.value),
            ConditionOperator::GreaterThan => compare(field, &self.value)
                .is_some_and(|ord| ord == std::cmp::Ordering::Greater),
            ConditionOperator::LessThan => {
                compare(field, &self.value).is_some_and(|ord| ord == std::cmp::Ordering::Less)
            }
            ConditionOperator::IsEmpty => is_empty(field),
            ConditionOperator::IsNotEmpty => !is_empty(field),
            ConditionOperator::IsTrue => truthiness(field) == Some(true),
            ConditionOperator::IsFalse => truthiness(field) == Some(false),
            ConditionOperator::Unknown => false,
        }
    }
}

/// Walks a dot-separated path through nested objects.
fn lookup<'a>(payload: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = payload;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Stringifies a scalar for comparison. Strings compare by their
/// contents rather than their JSON rendering.
fn coerce_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn equals(field: Option<&JsonValue>, operand: &JsonValue) -> bool {
    let (Some(field), Some(operand)) = (field.and_then(coerce_string), coerce_string(operand))
    else {
        return false;
    };
    field == operand
}

/// Substring match for strings; element match for arrays.
fn contains(field: Option<&JsonValue>, operand: &JsonValue) -> bool {
    let Some(needle) = coerce_string(operand) else {
        return false;
    };
    match field {
        Some(JsonValue::Array(items)) => items
            .iter()
            .any(|item| coerce_string(item).is_some_and(|s| s == needle)),
        Some(other) => coerce_string(other).is_some_and(|s| s.contains(&needle)),
        None => false,
    }
}

/// Numeric coercion for ordering comparisons. Strings that parse as
/// numbers participate; everything else opts out.
fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare(field: Option<&JsonValue>, operand: &JsonValue) -> Option<std::cmp::Ordering> {
    let lhs = coerce_number(field?)?;
    let rhs = coerce_number(operand)?;
    lhs.partial_cmp(&rhs)
}

/// A missing field, null, empty string, empty array, and empty object
/// all count as empty.
fn is_empty(field: Option<&JsonValue>) -> bool {
    match field {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        Some(JsonValue::Array(items)) => items.is_empty(),
        Some(JsonValue::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Booleans and the strings "true"/"false" have a truth value;
/// everything else has none.
fn truthiness(field: Option<&JsonValue>) -> Option<bool> {
    match field {
        Some(JsonValue::Bool(b)) => Some(*b),
        Some(JsonValue::String(s)) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(field: &str, operator: ConditionOperator, value: JsonValue) -> ConditionConfig {
        ConditionConfig {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn equals_coerces_to_string() {
        let payload = json!({"shoot_count": 3});
        assert!(condition("shoot_count", ConditionOperator::Equals, json!(3)).evaluate(&payload));
        assert!(condition("shoot_count", ConditionOperator::Equals, json!("3")).evaluate(&payload));
        assert!(
            !condition("shoot_count", ConditionOperator::Equals, json!(4)).evaluate(&payload)
        );
    }

    #[test]
    fn equals_and_not_equals_are_negations() {
        let payload = json!({"booking": {"type": "wedding"}});
        let cases = [
            ("booking.type", json!("wedding")),
            ("booking.type", json!("portrait")),
            ("booking.missing", json!("wedding")),
            ("absent.path", json!(null)),
        ];
        for (field, value) in cases {
            let eq = condition(field, ConditionOperator::Equals, value.clone()).evaluate(&payload);
            let ne = condition(field, ConditionOperator::NotEquals, value).evaluate(&payload);
            assert_ne!(eq, ne, "negation must hold for field {field}");
        }
    }

    #[test]
    fn dot_path_walks_nested_objects() {
        let payload = json!({"gallery": {"client": {"name": "Ada"}}});
        assert!(
            condition("gallery.client.name", ConditionOperator::Equals, json!("Ada"))
                .evaluate(&payload)
        );
        assert!(
            !condition("gallery.client.missing", ConditionOperator::Equals, json!("Ada"))
                .evaluate(&payload)
        );
    }

    #[test]
    fn contains_matches_substrings_and_array_elements() {
        let payload = json!({
            "notes": "rush delivery requested",
            "tags": ["wedding", "outdoor"],
        });
        assert!(condition("notes", ConditionOperator::Contains, json!("rush")).evaluate(&payload));
        assert!(
            condition("tags", ConditionOperator::Contains, json!("outdoor")).evaluate(&payload)
        );
        assert!(!condition("tags", ConditionOperator::Contains, json!("studio")).evaluate(&payload));
        assert!(
            condition("tags", ConditionOperator::NotContains, json!("studio")).evaluate(&payload)
        );
    }

    #[test]
    fn ordering_coerces_numeric_strings() {
        let payload = json!({"price": "1200", "count": 4});
        assert!(
            condition("price", ConditionOperator::GreaterThan, json!(1000)).evaluate(&payload)
        );
        assert!(condition("count", ConditionOperator::LessThan, json!("10")).evaluate(&payload));
        assert!(
            !condition("price", ConditionOperator::GreaterThan, json!("not a number"))
                .evaluate(&payload)
        );
    }

    #[test]
    fn ordering_fails_closed_on_non_numeric_field() {
        let payload = json!({"name": "Ada"});
        assert!(!condition("name", ConditionOperator::GreaterThan, json!(1)).evaluate(&payload));
        assert!(!condition("name", ConditionOperator::LessThan, json!(1)).evaluate(&payload));
    }

    #[test]
    fn is_empty_and_is_not_empty_are_negations() {
        let payload = json!({
            "empty_string": "",
            "empty_array": [],
            "empty_object": {},
            "null_field": null,
            "filled": "value",
        });
        for field in [
            "empty_string",
            "empty_array",
            "empty_object",
            "null_field",
            "missing_field",
            "filled",
        ] {
            let empty =
                condition(field, ConditionOperator::IsEmpty, json!(null)).evaluate(&payload);
            let not_empty =
                condition(field, ConditionOperator::IsNotEmpty, json!(null)).evaluate(&payload);
            assert_ne!(empty, not_empty, "negation must hold for field {field}");
        }
        assert!(condition("missing_field", ConditionOperator::IsEmpty, json!(null))
            .evaluate(&payload));
        assert!(condition("filled", ConditionOperator::IsNotEmpty, json!(null)).evaluate(&payload));
    }

    #[test]
    fn truthiness_accepts_bools_and_bool_strings() {
        let payload = json!({"flag": true, "stringy": "false", "number": 1});
        assert!(condition("flag", ConditionOperator::IsTrue, json!(null)).evaluate(&payload));
        assert!(condition("stringy", ConditionOperator::IsFalse, json!(null)).evaluate(&payload));
        assert!(!condition("number", ConditionOperator::IsTrue, json!(null)).evaluate(&payload));
        assert!(!condition("number", ConditionOperator::IsFalse, json!(null)).evaluate(&payload));
        assert!(!condition("missing", ConditionOperator::IsTrue, json!(null)).evaluate(&payload));
    }

    #[test]
    fn unknown_operator_deserializes_and_fails_closed() {
        let config: ConditionConfig = serde_json::from_value(json!({
            "field": "anything",
            "operator": "matches_regex",
            "value": ".*",
        }))
        .expect("unknown operators must still deserialize");
        assert_eq!(config.operator, ConditionOperator::Unknown);
        assert!(!config.evaluate(&json!({"anything": "value"})));
    }
}
