//! Per-run mutable state: `ExecutionContext`, `ActionResult`, `ExecutionLog`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::security::redact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// The result of running a single action, including every attempt made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_name: String,
    pub status: ActionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub output: Option<HashMap<String, Value>>,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            status: ActionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            attempts: 0,
            output: None,
            error: None,
        }
    }

    /// Every terminal status implies `end_time` is set (spec.md §3 invariant).
    pub fn finish(&mut self, status: ActionStatus) {
        debug_assert!(matches!(
            status,
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Skipped
        ));
        self.status = status;
        self.end_time = Some(Utc::now());
    }
}

/// One append-only log entry. `params` are always passed through `redact`
/// before being stored here — never construct one with raw params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub step: u32,
    pub action: String,
    pub kind: String,
    pub message: String,
    pub params_redacted: Option<HashMap<String, Value>>,
    pub status: String,
    pub data: Option<Value>,
}

impl ExecutionLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        level: LogLevel,
        step: u32,
        action: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
        params: Option<HashMap<String, Value>>,
        status: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            step,
            action: action.into(),
            kind: kind.into(),
            message: message.into(),
            params_redacted: params.map(|p| redact(&p)),
            status: status.into(),
            data,
        }
    }
}

/// The mutable state of a single run. Created on `execute`, mutated only by
/// the Executor and its delegates on the run's owning task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub run_id: String,
    pub workflow_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub variables: HashMap<String, Value>,
    pub results: HashMap<String, ActionResult>,
    pub logs: Vec<ExecutionLog>,
    pub metadata: HashMap<String, Value>,
    /// Most recent HTTP-shaped response, used by the Rule Engine's
    /// `response.*` field paths and by `parse_json`'s default source.
    pub response: Option<Value>,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id: workflow_id.into(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            variables: HashMap::new(),
            results: HashMap::new(),
            logs: Vec::new(),
            metadata: HashMap::new(),
            response: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        debug_assert!(matches!(
            status,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        ));
        self.status = status;
        self.end_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_result_finish_sets_end_time() {
        let mut result = ActionResult::new("a");
        assert!(result.end_time.is_none());
        result.finish(ActionStatus::Completed);
        assert!(result.end_time.is_some());
        assert_eq!(result.status, ActionStatus::Completed);
    }

    #[test]
    fn execution_log_redacts_params_on_construction() {
        let mut params = HashMap::new();
        params.insert("password".to_string(), Value::String("hunter2".to_string()));
        let log = ExecutionLog::new(
            LogLevel::Info,
            0,
            "a",
            "http_fetch",
            "request sent",
            Some(params),
            "completed",
            None,
        );
        let redacted = log.params_redacted.unwrap();
        assert_ne!(redacted.get("password").unwrap().as_str().unwrap(), "hunter2");
    }
}
