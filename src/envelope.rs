//! The declarative workflow document an envelope run executes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::retry::profile::RetryProfile;

/// Top-level input to the Executor. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default = "default_version")]
    pub version: String,
    pub intent: Intent,
    #[serde(default)]
    pub payload: HashMap<String, Value>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub secrets: HashMap<String, Value>,
}

fn default_version() -> String {
    "1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    #[serde(default = "default_intent_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Workflow-wide deadline. Defaults to 30 minutes per the Executor contract.
    #[serde(default = "default_workflow_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub default_retry_profile: Option<String>,
    #[serde(default)]
    pub default_budget: Option<String>,
}

fn default_intent_version() -> String {
    "1".to_string()
}

fn default_workflow_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

/// One step of an envelope. `name` must be unique within the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry_policy: Option<ActionRetryOverride>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

fn default_enabled() -> bool {
    true
}

/// An explicit per-action retry override. `max_attempts`, when present, is
/// a hard ceiling the Policy Engine's in-flight extension may never exceed
/// (spec.md §9 Open Question 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRetryOverride {
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// The closed set of built-in action kinds. Internally tagged on `kind` so
/// config schema mismatches are caught at decode time, never at dispatch
/// time (spec.md §9, "the set is closed for v1").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    HttpFetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default = "default_http_timeout_ms")]
        timeout_ms: u64,
    },
    ParseJson {
        #[serde(default = "default_parse_source")]
        source: String,
        jsonpath: String,
        target: String,
    },
    Set {
        variable: String,
        value: Value,
    },
    Sleep {
        seconds: f64,
    },
    Log {
        message: String,
        #[serde(default = "default_log_level")]
        level: String,
    },
    If {
        condition: String,
        #[serde(default)]
        then: Vec<Action>,
        #[serde(default)]
        r#else: Vec<Action>,
    },
    Repeat {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        r#while: Option<String>,
        body: Vec<Action>,
        #[serde(default = "default_max_iterations")]
        max_iterations: u64,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_parse_source() -> String {
    "response.body".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_iterations() -> u64 {
    1000
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::HttpFetch { .. } => "http_fetch",
            ActionKind::ParseJson { .. } => "parse_json",
            ActionKind::Set { .. } => "set",
            ActionKind::Sleep { .. } => "sleep",
            ActionKind::Log { .. } => "log",
            ActionKind::If { .. } => "if",
            ActionKind::Repeat { .. } => "repeat",
        }
    }
}

/// A loaded, named retry profile, kept alongside its envelope-agnostic
/// counterpart so envelopes can reference profiles by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRetryProfile {
    pub name: String,
    #[serde(flatten)]
    pub profile: RetryProfile,
}
