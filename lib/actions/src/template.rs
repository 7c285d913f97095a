//! Template substitution for action fields.
//!
//! Action configs may reference payload fields with `{fieldName}`
//! placeholders. Substitution is flat: a placeholder names a top-level
//! payload field, never a dot path (paths belong to conditions).
//! Unknown placeholders are left in place so a typo is visible in the
//! output rather than silently erased.

use serde_json::Value as JsonValue;

/// Replaces every `{fieldName}` occurrence with the stringified value
/// of the payload's top-level field.
#[must_use]
pub fn render(template: &str, payload: &JsonValue) -> String {
    let Some(fields) = payload.as_object() else {
        return template.to_string();
    };

    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        match after_open.find('}') {
            Some(close) => {
                let name = &after_open[..close];
                match fields.get(name) {
                    Some(value) => output.push_str(&stringify(value)),
                    None => {
                        output.push('{');
                        output.push_str(name);
                        output.push('}');
                    }
                }
                rest = &after_open[close + 1..];
            }
            None => {
                // Unclosed brace, keep the rest verbatim.
                output.push_str(&rest[open..]);
                return output;
            }
        }
    }

    output.push_str(rest);
    output
}

/// Strings render bare; everything else renders as JSON.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_top_level_fields() {
        let payload = json!({"client_name": "Ada", "gallery_name": "Spring Wedding"});
        let rendered = render("Hi {client_name}, {gallery_name} is ready!", &payload);
        assert_eq!(rendered, "Hi Ada, Spring Wedding is ready!");
    }

    #[test]
    fn stringifies_non_string_values() {
        let payload = json!({"count": 12, "paid": true});
        assert_eq!(render("{count} photos, paid: {paid}", &payload), "12 photos, paid: true");
    }

    #[test]
    fn unknown_placeholder_is_left_in_place() {
        let payload = json!({"name": "Ada"});
        assert_eq!(render("Hi {nmae}", &payload), "Hi {nmae}");
    }

    #[test]
    fn placeholders_are_flat_not_dot_paths() {
        let payload = json!({"client": {"name": "Ada"}});
        // Nested lookups are not supported; the whole object renders as JSON
        // and a dotted placeholder matches nothing.
        assert_eq!(render("{client.name}", &payload), "{client.name}");
        assert_eq!(render("{client}", &payload), r#"{"name":"Ada"}"#);
    }

    #[test]
    fn repeated_placeholders_all_substitute() {
        let payload = json!({"name": "Ada"});
        assert_eq!(render("{name} {name}", &payload), "Ada Ada");
    }

    #[test]
    fn unclosed_brace_is_kept_verbatim() {
        let payload = json!({"name": "Ada"});
        assert_eq!(render("Hi {name", &payload), "Hi {name");
    }

    #[test]
    fn non_object_payload_renders_template_unchanged() {
        assert_eq!(render("Hi {name}", &json!("just a string")), "Hi {name}");
    }
}
