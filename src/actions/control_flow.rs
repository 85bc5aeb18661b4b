//! Condition evaluation shared by the `if` and `repeat` action kinds.
//! Generalizes `flow.rs`'s `NodeType::While` template-substituted loop
//! condition into a small comparison-expression evaluator built on the
//! same `Operator` set the Rule Engine uses.

use crate::actions::template::render;
use crate::rules::operators::Operator;
use serde_json::Value;
use std::collections::HashMap;

const OPERATORS: &[(&str, Operator)] = &[
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

fn parse_literal(token: &str) -> Value {
    let trimmed = token.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
    {
        return Value::String(inner.to_string());
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        return serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => Value::String(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Renders `{{...}}` templates in `condition` against `variables`, then
/// evaluates it either as a `<left> <op> <right>` comparison or, if no
/// operator is found, as a bare truthiness check of the rendered text.
pub fn evaluate(condition: &str, variables: &HashMap<String, Value>) -> bool {
    let rendered = render(condition, variables);
    for (symbol, op) in OPERATORS {
        if let Some(idx) = rendered.find(symbol) {
            let left = parse_literal(&rendered[..idx]);
            let right = parse_literal(&rendered[idx + symbol.len()..]);
            return op.evaluate(Some(&left), &right);
        }
    }
    is_truthy(&parse_literal(&rendered))
}
