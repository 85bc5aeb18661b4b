//! The declarative Rule Engine: condition trees evaluated over runtime
//! context, emitting declarative actions the Executor applies.
//!
//! No single teacher module owns this; the evaluation machinery is grounded
//! on `agentflow-nodes::nodes::conditional::ConditionalNode` (per-operator
//! match arms, now in `rules::operators`) and `flow.rs`'s dotted-path field
//! resolution (`nodes.<id>.outputs.<name>`), generalized to resolve against
//! `{variables, request, response, metadata, timestamp}` instead of a
//! node-output pool.

pub mod operators;

use crate::error::MovaError;
use chrono::{DateTime, Utc};
use operators::Operator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub conditions: Vec<RuleCondition>,
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    SetVar { variable: String, value: Value },
    Log { message: String, #[serde(default = "default_log_level")] level: String },
    Skip { #[serde(default)] reason: Option<String> },
    Stop { #[serde(default)] reason: Option<String> },
    Route { workflow: String, #[serde(default)] reason: Option<String> },
    Retry { #[serde(default)] profile: Option<String>, #[serde(default)] max_attempts: Option<u32>, #[serde(default)] delay_ms: Option<u64> },
    HttpCall {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    Transform { #[serde(rename = "type")] transform_type: TransformType, source: String, target: String },
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    Identity,
    ToString,
    ToNumber,
    JsonParse,
    JsonStringify,
}

impl TransformType {
    pub fn apply(&self, input: &Value) -> Value {
        match self {
            TransformType::Identity => input.clone(),
            TransformType::ToString => Value::String(match input {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            TransformType::ToNumber => match input {
                Value::Number(_) => input.clone(),
                Value::String(s) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            },
            TransformType::JsonParse => match input {
                Value::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
                other => other.clone(),
            },
            TransformType::JsonStringify => {
                Value::String(serde_json::to_string(input).unwrap_or_default())
            }
        }
    }
}

/// A read-only snapshot of the fields rule conditions may reference,
/// resolved via dotted field paths such as `response.headers.content_type`.
pub struct RuleContext<'a> {
    pub variables: &'a HashMap<String, Value>,
    pub request: Option<&'a Value>,
    pub response: Option<&'a Value>,
    pub metadata: &'a HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

fn resolve_in_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl<'a> RuleContext<'a> {
    pub fn resolve(&self, field_path: &str) -> Option<Value> {
        let mut parts = field_path.splitn(2, '.');
        let namespace = parts.next()?;
        let rest = parts.next().unwrap_or("");
        match namespace {
            "variables" => resolve_in_value(&Value::Object(
                self.variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ), rest)
            .cloned(),
            "request" => self.request.and_then(|r| resolve_in_value(r, rest)).cloned(),
            "response" => self.response.and_then(|r| resolve_in_value(r, rest)).cloned(),
            "metadata" => resolve_in_value(&Value::Object(
                self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ), rest)
            .cloned(),
            "timestamp" => Some(Value::String(self.timestamp.to_rfc3339())),
            // Bare top-level field names (as used by the concrete test
            // scenarios, e.g. `status == "error"`) resolve against variables.
            _ => resolve_in_value(&Value::Object(
                self.variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ), field_path)
            .cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuleEvalResult {
    pub rule_id: String,
    pub matched: bool,
    pub actions: Vec<RuleAction>,
    pub error: Option<String>,
}

/// Rejects a ruleset missing conditions/actions on any rule, per spec.md's
/// §4.6 validation rule. Unknown operator/kind is already rejected at
/// decode time by serde's closed tagged enums.
pub fn validate_ruleset(rules: &[Rule]) -> Result<(), MovaError> {
    for rule in rules {
        if rule.conditions.is_empty() {
            return Err(MovaError::InvalidConfig {
                message: format!("rule '{}' has zero conditions", rule.id),
            });
        }
        if rule.actions.is_empty() {
            return Err(MovaError::InvalidConfig {
                message: format!("rule '{}' has zero actions", rule.id),
            });
        }
    }
    Ok(())
}

fn rule_matches(rule: &Rule, context: &RuleContext) -> bool {
    rule.conditions.iter().all(|cond| {
        let actual = context.resolve(&cond.field);
        let outcome = cond.operator.evaluate(actual.as_ref(), &cond.value);
        outcome != cond.negate
    })
}

/// Evaluates rules in descending priority, ruleset declaration order as
/// the tiebreak (spec.md §8's rule-priority universal).
pub fn evaluate(rules: &[Rule], context: &RuleContext) -> Vec<RuleEvalResult> {
    let mut indexed: Vec<(usize, &Rule)> = rules.iter().enumerate().filter(|(_, r)| r.enabled).collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.priority.cmp(&a.priority).then(ia.cmp(ib)));

    indexed
        .into_iter()
        .map(|(_, rule)| {
            let matched = rule_matches(rule, context);
            RuleEvalResult {
                rule_id: rule.id.clone(),
                matched,
                actions: if matched { rule.actions.clone() } else { Vec::new() },
                error: None,
            }
        })
        .collect()
}
