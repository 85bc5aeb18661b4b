//! The 13-operator set the Rule Engine and the `if`/`repeat` action
//! condition evaluator share. Generalizes
//! `agentflow-nodes::nodes::conditional::ConditionalNode::evaluate_condition`'s
//! per-kind match arms into a named, serializable operator type.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    Regex,
    In,
    NotIn,
    Exists,
    NotExists,
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn ordered_cmp(actual: &Value, expected: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_f64(actual), as_f64(expected)) {
        return a.partial_cmp(&b);
    }
    let a = as_str(actual)?;
    let b = as_str(expected)?;
    Some(a.cmp(&b))
}

impl Operator {
    /// Evaluates this operator given the resolved field value (`None` if
    /// the field path did not resolve) and the rule's configured value.
    pub fn evaluate(&self, actual: Option<&Value>, expected: &Value) -> bool {
        match self {
            Operator::Exists => actual.is_some(),
            Operator::NotExists => actual.is_none(),
            Operator::Eq => actual.map(|a| a == expected).unwrap_or(false),
            Operator::Ne => actual.map(|a| a != expected).unwrap_or(true),
            Operator::Gt => actual
                .and_then(|a| ordered_cmp(a, expected))
                .map(|o| o == std::cmp::Ordering::Greater)
                .unwrap_or(false),
            Operator::Gte => actual
                .and_then(|a| ordered_cmp(a, expected))
                .map(|o| o != std::cmp::Ordering::Less)
                .unwrap_or(false),
            Operator::Lt => actual
                .and_then(|a| ordered_cmp(a, expected))
                .map(|o| o == std::cmp::Ordering::Less)
                .unwrap_or(false),
            Operator::Lte => actual
                .and_then(|a| ordered_cmp(a, expected))
                .map(|o| o != std::cmp::Ordering::Greater)
                .unwrap_or(false),
            Operator::Contains => match (actual, expected) {
                (Some(Value::String(a)), Value::String(b)) => a.contains(b.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
            Operator::NotContains => !Operator::Contains.evaluate(actual, expected),
            Operator::Regex => match (actual.and_then(as_str), expected.as_str()) {
                (Some(text), Some(pattern)) => Regex::new(pattern)
                    .map(|re| re.is_match(&text))
                    .unwrap_or(false),
                _ => false,
            },
            Operator::In => match (actual, expected) {
                (Some(value), Value::Array(items)) => items.contains(value),
                _ => false,
            },
            Operator::NotIn => !Operator::In.evaluate(actual, expected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_and_ne() {
        assert!(Operator::Eq.evaluate(Some(&json!("error")), &json!("error")));
        assert!(Operator::Ne.evaluate(Some(&json!("ok")), &json!("error")));
    }

    #[test]
    fn ordering_operators_compare_numerically() {
        assert!(Operator::Gt.evaluate(Some(&json!(10)), &json!(5)));
        assert!(!Operator::Lt.evaluate(Some(&json!(10)), &json!(5)));
        assert!(Operator::Gte.evaluate(Some(&json!(5)), &json!(5)));
    }

    #[test]
    fn exists_and_not_exists() {
        assert!(Operator::Exists.evaluate(Some(&json!(1)), &Value::Null));
        assert!(Operator::NotExists.evaluate(None, &Value::Null));
    }

    #[test]
    fn in_and_not_in_expect_array_values() {
        assert!(Operator::In.evaluate(Some(&json!("b")), &json!(["a", "b", "c"])));
        assert!(Operator::NotIn.evaluate(Some(&json!("z")), &json!(["a", "b", "c"])));
    }

    #[test]
    fn regex_matches_against_string() {
        assert!(Operator::Regex.evaluate(Some(&json!("abc123")), &json!(r"^\w+\d+$")));
    }
}
