//! `set` — always-succeeding variable assignment with template substitution.

use crate::actions::template::render_value;
use crate::envelope::ActionKind;
use crate::error::MovaError;
use serde_json::Value;
use std::collections::HashMap;

pub fn execute(
    kind: &ActionKind,
    variables: &mut HashMap<String, Value>,
) -> Result<HashMap<String, Value>, MovaError> {
    let (variable, value) = match kind {
        ActionKind::Set { variable, value } => (variable, value),
        _ => unreachable!("set::execute called with non-Set action"),
    };

    let rendered = render_value(value, variables);
    variables.insert(variable.clone(), rendered.clone());

    let mut output = HashMap::new();
    output.insert("variable".to_string(), Value::String(variable.clone()));
    output.insert("value".to_string(), rendered);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_rendered_value_into_variables() {
        let mut variables = HashMap::new();
        variables.insert("payload".to_string(), json!({"name": "World"}));
        let kind = ActionKind::Set {
            variable: "g".to_string(),
            value: json!("Hello, {{payload.name}}!"),
        };
        execute(&kind, &mut variables).unwrap();
        assert_eq!(variables.get("g"), Some(&json!("Hello, World!")));
    }
}
