//! `parse_json` — extracts a value from the run's current context via a
//! minimal JSONPath subset: dotted field names, numeric array indices, and
//! an optional leading `$`.

use crate::actions::template::resolve_path;
use crate::context::ExecutionContext;
use crate::envelope::ActionKind;
use crate::error::MovaError;
use serde_json::Value;
use std::collections::HashMap;

fn resolve_jsonpath<'a>(root: &'a Value, jsonpath: &str) -> Option<&'a Value> {
    let trimmed = jsonpath.strip_prefix('$').unwrap_or(jsonpath);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for part in trimmed.split('.') {
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

/// Resolves `source` against the run's context: a leading `response` (or
/// `response.<rest>`) segment reads from `context.response` (where the
/// Executor stores the most recent `http_fetch` output, see
/// `executor::execute_leaf`), matching how the Rule Engine's own
/// `response.*` field paths resolve. Everything else falls back to
/// `context.variables`.
fn resolve_source<'a>(context: &'a ExecutionContext, source: &str) -> Option<&'a Value> {
    if source == "response" {
        return context.response.as_ref();
    }
    if let Some(rest) = source.strip_prefix("response.") {
        return context.response.as_ref().and_then(|r| resolve_jsonpath(r, rest));
    }
    resolve_path(&context.variables, source)
}

pub fn execute(
    kind: &ActionKind,
    context: &mut ExecutionContext,
) -> Result<HashMap<String, Value>, MovaError> {
    let (source, jsonpath, target) = match kind {
        ActionKind::ParseJson { source, jsonpath, target } => (source, jsonpath, target),
        _ => unreachable!("parse_json::execute called with non-ParseJson action"),
    };

    let root = resolve_source(context, source).ok_or_else(|| MovaError::InvalidConfig {
        message: format!("path not found: source '{}' does not resolve", source),
    })?;

    let extracted = resolve_jsonpath(root, jsonpath)
        .cloned()
        .ok_or_else(|| MovaError::InvalidConfig {
            message: format!("path not found: '{}'", jsonpath),
        })?;

    context.variables.insert(target.clone(), extracted.clone());

    let mut output = HashMap::new();
    output.insert("target".to_string(), Value::String(target.clone()));
    output.insert("value".to_string(), extracted);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_field_from_response() {
        let mut context = ExecutionContext::new("r1", "wf");
        context.response = Some(json!({"body": {"user": {"id": 42}}}));
        let kind = ActionKind::ParseJson {
            source: "response.body".to_string(),
            jsonpath: "$.user.id".to_string(),
            target: "user_id".to_string(),
        };
        execute(&kind, &mut context).unwrap();
        assert_eq!(context.variables.get("user_id"), Some(&json!(42)));
    }

    #[test]
    fn extracts_from_a_plain_variable_source() {
        let mut context = ExecutionContext::new("r1", "wf");
        context.variables.insert("payload".to_string(), json!({"user": {"id": 7}}));
        let kind = ActionKind::ParseJson {
            source: "payload".to_string(),
            jsonpath: "$.user.id".to_string(),
            target: "user_id".to_string(),
        };
        execute(&kind, &mut context).unwrap();
        assert_eq!(context.variables.get("user_id"), Some(&json!(7)));
    }

    #[test]
    fn missing_path_fails() {
        let mut context = ExecutionContext::new("r1", "wf");
        context.response = Some(json!({"body": {}}));
        let kind = ActionKind::ParseJson {
            source: "response.body".to_string(),
            jsonpath: "$.missing".to_string(),
            target: "x".to_string(),
        };
        let err = execute(&kind, &mut context).unwrap_err();
        assert!(err.to_string().contains("path not found"));
    }

    #[test]
    fn missing_response_fails_with_path_not_found() {
        let mut context = ExecutionContext::new("r1", "wf");
        let kind = ActionKind::ParseJson {
            source: "response.body".to_string(),
            jsonpath: "$.user.id".to_string(),
            target: "user_id".to_string(),
        };
        let err = execute(&kind, &mut context).unwrap_err();
        assert!(err.to_string().contains("path not found"));
    }
}
