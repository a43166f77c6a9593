/// Placeholder substitution for prompts, conditions and text templates
///
/// `{{input}}` is replaced with the string form of the whole value. When the
/// value is a map, `{{key}}` is replaced with the string form of that entry.
/// No escaping, no recursion; unmatched placeholders stay verbatim.

use serde_json::Value;

/// Marker for the whole-value substitution
pub const INPUT_MARKER: &str = "{{input}}";

/// Render `template` against `value`
pub fn render(template: &str, value: &Value) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut rendered = template.replace(INPUT_MARKER, &display_value(value));

    if let Value::Object(map) = value {
        for (key, entry) in map {
            let marker = format!("{{{{{}}}}}", key);
            rendered = rendered.replace(&marker, &display_value(entry));
        }
    }

    rendered
}

/// String form of a value as seen by templates and tool placeholders
///
/// Strings are emitted raw, null is empty, everything else is compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}
