//! `{{dotted.path}}` substitution against a variables map. Generalizes
//! `agentflow-nodes::nodes::template::TemplateNode::render_template`'s
//! regex-free brace scan into a dotted-path resolver shared by `set`,
//! `http_fetch`, and the `repeat`/`if` condition evaluators.

use serde_json::Value;
use std::collections::HashMap;

/// Resolves a dotted path like `payload.name` or `response.status_code`
/// against a flat variables map whose own values may themselves be nested
/// JSON objects.
pub fn resolve_path<'a>(variables: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = variables.get(first)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(arr) => {
                let idx: usize = part.parse().ok()?;
                arr.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

fn value_to_template_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replaces every `{{path}}` occurrence in `template` with the resolved
/// value, rendered as a bare string for `Value::String` leaves and as JSON
/// text otherwise. Unresolvable paths are left untouched.
pub fn render(template: &str, variables: &HashMap<String, Value>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        match rest.find("{{") {
            None => {
                output.push_str(rest);
                break;
            }
            Some(start) => {
                output.push_str(&rest[..start]);
                let after_open = &rest[start + 2..];
                match after_open.find("}}") {
                    None => {
                        output.push_str(&rest[start..]);
                        break;
                    }
                    Some(end) => {
                        let path = after_open[..end].trim();
                        match resolve_path(variables, path) {
                            Some(value) => output.push_str(&value_to_template_string(value)),
                            None => {
                                output.push_str("{{");
                                output.push_str(path);
                                output.push_str("}}");
                            }
                        }
                        rest = &after_open[end + 2..];
                    }
                }
            }
        }
    }
    output
}

/// Renders a `Value` recursively: string leaves go through `render`;
/// objects/arrays are walked; everything else is returned unchanged.
pub fn render_value(value: &Value, variables: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, variables)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| render_value(v, variables)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> HashMap<String, Value> {
        let mut v = HashMap::new();
        v.insert("payload".to_string(), json!({"name": "World"}));
        v
    }

    #[test]
    fn substitutes_nested_path() {
        let out = render("Hello, {{payload.name}}!", &vars());
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn leaves_unresolvable_path_untouched() {
        let out = render("{{payload.missing}}", &vars());
        assert_eq!(out, "{{payload.missing}}");
    }

    #[test]
    fn renders_nested_object_values() {
        let mut v = vars();
        v.insert("greeting".to_string(), json!("Hi"));
        let value = json!({"msg": "{{greeting}}, {{payload.name}}"});
        let rendered = render_value(&value, &v);
        assert_eq!(rendered, json!({"msg": "Hi, World"}));
    }
}
