//! The Executor: drives one envelope run end-to-end.
//!
//! Generalizes `async_flow.rs`'s `AsyncFlow` (per-run timeout, sequential
//! node execution, status tracking) from a topologically-sorted node DAG to
//! spec.md's already-ordered action list, adding budget admission per
//! action, Rule Engine evaluation after each completed action, and
//! recursive handling of the `if`/`repeat` control-flow kinds.

use crate::actions::{self, http_fetch, template};
use crate::budget::{BudgetAccountant, BudgetKind, BudgetRequest};
use crate::cancellation::CancellationToken;
use crate::context::{ActionResult, ActionStatus, ExecutionContext, ExecutionLog, LogLevel, RunStatus};
use crate::dlq::DlqStore;
use crate::envelope::{Action, ActionKind, Envelope};
use crate::error::MovaError;
use crate::observability::{self, MetricsCollector};
use crate::policy::PolicyEngine;
use crate::retry::controller::execute_with_retry;
use crate::retry::profile::RetryProfile;
use crate::rules::{Rule, RuleAction, RuleContext};
use crate::run_registry::RunRegistry;
use crate::security::SecurityConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// How a finished action slice (top-level list, an `if` branch, or a
/// `repeat` body) asks its caller to continue.
enum Signal {
    Continue,
    Stop,
    Failed,
    Cancelled,
}

pub struct Executor {
    security: SecurityConfig,
    default_retry_profile: RetryProfile,
    policy_engine: Option<PolicyEngine>,
    dlq: Option<Arc<dyn DlqStore>>,
    budget: Option<BudgetAccountant>,
    rules: Vec<Rule>,
    registry: RunRegistry,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            security: SecurityConfig::default(),
            default_retry_profile: RetryProfile::balanced(),
            policy_engine: None,
            dlq: None,
            budget: None,
            rules: Vec::new(),
            registry: RunRegistry::new(),
            metrics: None,
        }
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_default_retry_profile(mut self, profile: RetryProfile) -> Self {
        self.default_retry_profile = profile;
        self
    }

    pub fn with_policy_engine(mut self, engine: PolicyEngine) -> Self {
        self.policy_engine = Some(engine);
        self
    }

    pub fn with_dlq(mut self, dlq: Arc<dyn DlqStore>) -> Self {
        self.dlq = Some(dlq);
        self
    }

    pub fn with_budget(mut self, budget: BudgetAccountant) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Attaches an in-process metrics collector; a host binary can poll it
    /// (e.g. to serve its own `/metrics` endpoint) without the core crate
    /// owning any exporter surface (spec.md's Non-goals exclude one).
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Allocates a run_id, registers it as `running`, and returns
    /// immediately; the run proceeds on its own task.
    pub fn execute(self: &Arc<Self>, envelope: Envelope) -> String {
        let (run_id, context, cancellation) = self.prepare_run(&envelope);
        self.registry.register(context, cancellation.clone());
        let executor = Arc::clone(self);
        let id_for_task = run_id.clone();
        tokio::spawn(async move {
            executor.drive(id_for_task, envelope, cancellation).await;
        });
        run_id
    }

    /// Runs the envelope to completion on the calling task and returns the
    /// final context directly.
    pub async fn execute_sync(self: &Arc<Self>, envelope: Envelope) -> ExecutionContext {
        let (run_id, context, cancellation) = self.prepare_run(&envelope);
        self.registry.register(context, cancellation.clone());
        self.drive(run_id.clone(), envelope, cancellation).await;
        self.registry.status(&run_id).expect("run was just registered")
    }

    pub fn status(&self, run_id: &str) -> Result<ExecutionContext, MovaError> {
        self.registry.status(run_id)
    }

    pub fn logs(&self, run_id: &str) -> Result<Vec<ExecutionLog>, MovaError> {
        self.registry.logs(run_id)
    }

    pub fn cancel(&self, run_id: &str) -> Result<(), MovaError> {
        self.registry.cancel(run_id)
    }

    /// Seeds variables from `envelope.variables`, then overlays `payload`
    /// and `secrets` under their own top-level namespace (spec.md §3).
    fn prepare_run(&self, envelope: &Envelope) -> (String, ExecutionContext, CancellationToken) {
        let run_id = Uuid::new_v4().to_string();
        let mut context = ExecutionContext::new(run_id.clone(), envelope.intent.name.clone());
        context.variables = envelope.variables.clone();
        context.variables.insert(
            "payload".to_string(),
            Value::Object(envelope.payload.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
        context.variables.insert(
            "secrets".to_string(),
            Value::Object(envelope.secrets.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        );
        let cancellation = CancellationToken::with_deadline(envelope.intent.timeout);
        (run_id, context, cancellation)
    }

    async fn drive(&self, run_id: String, envelope: Envelope, cancellation: CancellationToken) {
        let mut context = self.registry.status(&run_id).expect("run was just registered");
        let mut step = 0u32;

        let signal = execute_actions(
            self,
            &envelope.actions,
            &mut context,
            &envelope,
            &cancellation,
            &mut step,
            &run_id,
        )
        .await;

        let final_status = match signal {
            Signal::Cancelled => RunStatus::Cancelled,
            Signal::Failed => RunStatus::Failed,
            Signal::Stop | Signal::Continue => RunStatus::Completed,
        };
        context.finish(final_status);
        self.registry.update(&run_id, context);
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes one slice of actions in order (the top-level list, or a nested
/// `if`/`repeat` branch), applying budget admission and Rule Engine
/// evaluation after every completed action. Boxed because it recurses into
/// itself through `execute_control_flow`.
fn execute_actions<'a>(
    executor: &'a Executor,
    actions_list: &'a [Action],
    context: &'a mut ExecutionContext,
    envelope: &'a Envelope,
    cancellation: &'a CancellationToken,
    step: &'a mut u32,
    run_id: &'a str,
) -> Pin<Box<dyn Future<Output = Signal> + Send + 'a>> {
    Box::pin(async move {
        for action in actions_list {
            if cancellation.is_cancelled() {
                return Signal::Cancelled;
            }

            if !action.enabled || context.metadata.remove("skip_next").is_some() {
                let mut result = ActionResult::new(&action.name);
                result.finish(ActionStatus::Skipped);
                context.results.insert(action.name.clone(), result);
                continue;
            }

            *step += 1;
            let current_step = *step;

            if let Some(budget) = &executor.budget {
                let request = BudgetRequest::new(BudgetKind::Executions, "global");
                let decision = budget.check_and_record(&request);
                if !decision.allowed {
                    let err = MovaError::BudgetExceeded {
                        scope: "executions".to_string(),
                        reset_at: decision.reset_time.timestamp(),
                    };
                    record_failure(context, action, current_step, &err);
                    return Signal::Failed;
                }
            }

            let signal = if actions::is_control_flow(&action.kind) {
                execute_control_flow(executor, action, context, envelope, cancellation, step, run_id).await
            } else {
                execute_leaf(executor, action, context, envelope, cancellation, current_step).await
            };

            if !matches!(signal, Signal::Continue) {
                executor.registry.update(run_id, context.clone());
                return signal;
            }

            if !executor.rules.is_empty() {
                let rule_signal = apply_rules(executor, context, &action.name, cancellation).await;
                if !matches!(rule_signal, Signal::Continue) {
                    executor.registry.update(run_id, context.clone());
                    return rule_signal;
                }
            }

            // Publish progress after each completed action so concurrent
            // status()/logs() reads observe the run mid-flight, not just at
            // the terminal state (spec.md §6 GET /v1/runs/{id}).
            executor.registry.update(run_id, context.clone());
        }
        Signal::Continue
    })
}

async fn execute_leaf(
    executor: &Executor,
    action: &Action,
    context: &mut ExecutionContext,
    envelope: &Envelope,
    cancellation: &CancellationToken,
    step: u32,
) -> Signal {
    let mut result = ActionResult::new(&action.name);
    context.results.insert(action.name.clone(), result.clone());
    observability::record_action_event(
        executor.metrics.as_ref(),
        &context.run_id,
        &action.name,
        action.kind.name(),
        "action_start",
        None,
    );

    let outcome = execute_with_retry(
        cancellation,
        context,
        envelope,
        action,
        &executor.security,
        &executor.default_retry_profile,
        executor.policy_engine.as_ref(),
        executor.dlq.as_deref(),
    )
    .await;

    match outcome {
        Ok(retry_outcome) => {
            result.attempts = retry_outcome.attempts;
            if action.kind.name() == "http_fetch" {
                context.response = Some(json!({
                    "status_code": retry_outcome.output.get("status_code").cloned().unwrap_or(Value::Null),
                    "body": retry_outcome.output.get("body").cloned().unwrap_or(Value::Null),
                    "headers": retry_outcome.output.get("headers").cloned().unwrap_or(Value::Null),
                }));
            }
            result.output = Some(retry_outcome.output);
            result.finish(ActionStatus::Completed);
            let duration_ms = duration_since(&result);
            context.results.insert(action.name.clone(), result);
            append_log(context, step, action, "completed", None);
            observability::record_action_event(
                executor.metrics.as_ref(),
                &context.run_id,
                &action.name,
                action.kind.name(),
                "action_completed",
                duration_ms,
            );
            Signal::Continue
        }
        Err(err) => {
            result.attempts = match &err {
                MovaError::RetryExhausted { attempts } => *attempts,
                _ => result.attempts + 1,
            };
            result.error = Some(err.to_string());
            result.finish(ActionStatus::Failed);
            let duration_ms = duration_since(&result);
            context.results.insert(action.name.clone(), result);
            append_log(context, step, action, "failed", Some(err.to_string()));
            observability::record_action_event(
                executor.metrics.as_ref(),
                &context.run_id,
                &action.name,
                action.kind.name(),
                "action_failed",
                duration_ms,
            );
            if matches!(err, MovaError::Cancelled) {
                Signal::Cancelled
            } else {
                Signal::Failed
            }
        }
    }
}

fn execute_control_flow<'a>(
    executor: &'a Executor,
    action: &'a Action,
    context: &'a mut ExecutionContext,
    envelope: &'a Envelope,
    cancellation: &'a CancellationToken,
    step: &'a mut u32,
    run_id: &'a str,
) -> Pin<Box<dyn Future<Output = Signal> + Send + 'a>> {
    Box::pin(async move {
        match &action.kind {
            ActionKind::If { condition, then, r#else } => {
                let branch_taken = actions::control_flow::evaluate(condition, &context.variables);
                let branch: &[Action] = if branch_taken { then } else { r#else };
                let signal =
                    execute_actions(executor, branch, context, envelope, cancellation, step, run_id).await;

                let mut result = ActionResult::new(&action.name);
                result.output = Some(HashMap::from([(
                    "branch".to_string(),
                    Value::String(if branch_taken { "then" } else { "else" }.to_string()),
                )]));
                match signal {
                    Signal::Failed | Signal::Cancelled => result.finish(ActionStatus::Failed),
                    _ => result.finish(ActionStatus::Completed),
                }
                context.results.insert(action.name.clone(), result);
                signal
            }
            ActionKind::Repeat { count, r#while, body, max_iterations } => {
                let mut iterations = 0u64;
                let mut signal = Signal::Continue;
                loop {
                    if cancellation.is_cancelled() {
                        signal = Signal::Cancelled;
                        break;
                    }
                    if iterations >= *max_iterations {
                        break;
                    }
                    if let Some(n) = count {
                        if iterations >= *n {
                            break;
                        }
                    } else if let Some(cond) = r#while {
                        if !actions::control_flow::evaluate(cond, &context.variables) {
                            break;
                        }
                    } else {
                        break;
                    }

                    signal =
                        execute_actions(executor, body, context, envelope, cancellation, step, run_id).await;
                    iterations += 1;
                    if !matches!(signal, Signal::Continue) {
                        break;
                    }
                }

                let mut result = ActionResult::new(&action.name);
                result.output =
                    Some(HashMap::from([("iterations".to_string(), Value::from(iterations))]));
                match signal {
                    Signal::Failed | Signal::Cancelled => result.finish(ActionStatus::Failed),
                    _ => result.finish(ActionStatus::Completed),
                }
                context.results.insert(action.name.clone(), result);
                signal
            }
            _ => unreachable!("execute_control_flow called with a leaf action"),
        }
    })
}

/// Evaluates the attached ruleset against the current context and applies
/// every matched rule's declarative actions, in priority order, per
/// spec.md §4.6.
async fn apply_rules(
    executor: &Executor,
    context: &mut ExecutionContext,
    last_action_name: &str,
    cancellation: &CancellationToken,
) -> Signal {
    let results = {
        let rule_context = RuleContext {
            variables: &context.variables,
            request: None,
            response: context.response.as_ref(),
            metadata: &context.metadata,
            timestamp: chrono::Utc::now(),
        };
        crate::rules::evaluate(&executor.rules, &rule_context)
    };

    for evaluation in results {
        if !evaluation.matched {
            continue;
        }
        for rule_action in &evaluation.actions {
            let signal = apply_rule_action(executor, context, rule_action, last_action_name, cancellation).await;
            if !matches!(signal, Signal::Continue) {
                return signal;
            }
        }
    }
    Signal::Continue
}

async fn apply_rule_action(
    executor: &Executor,
    context: &mut ExecutionContext,
    action: &RuleAction,
    last_action_name: &str,
    _cancellation: &CancellationToken,
) -> Signal {
    match action {
        RuleAction::SetVar { variable, value } => {
            context.variables.insert(variable.clone(), value.clone());
            Signal::Continue
        }
        RuleAction::Log { message, level } => {
            if let Ok(parsed) = crate::actions::log::parse_level(level) {
                let log = ExecutionLog::new(
                    parsed,
                    0,
                    last_action_name.to_string(),
                    "rule",
                    message.clone(),
                    None,
                    "matched",
                    None,
                );
                context.logs.push(log);
            }
            Signal::Continue
        }
        RuleAction::Skip { .. } => {
            context.metadata.insert("skip_next".to_string(), Value::Bool(true));
            Signal::Continue
        }
        RuleAction::Stop { reason } => {
            if let Some(reason) = reason {
                context.metadata.insert("stop_reason".to_string(), Value::String(reason.clone()));
            }
            Signal::Stop
        }
        RuleAction::Route { workflow, reason } => {
            context.metadata.insert("routed_to".to_string(), Value::String(workflow.clone()));
            if let Some(reason) = reason {
                context.metadata.insert("route_reason".to_string(), Value::String(reason.clone()));
            }
            // Core records the redirect as metadata only; it never
            // auto-dispatches the named workflow (spec.md §9 Open Question 1).
            Signal::Stop
        }
        RuleAction::Retry { profile, max_attempts, .. } => {
            // The controller already owns the retry loop for the action
            // that just ran; a rule firing after the fact can only request
            // a follow-up re-run, which we surface as metadata for the
            // caller to act on rather than re-entering the retry loop here.
            if let Some(result) = context.results.get(last_action_name) {
                if result.status == ActionStatus::Failed {
                    context.metadata.insert(
                        "rule_retry_requested".to_string(),
                        json!({
                            "action": last_action_name,
                            "profile": profile,
                            "max_attempts": max_attempts,
                        }),
                    );
                }
            }
            Signal::Continue
        }
        RuleAction::HttpCall { url, method, headers, body, timeout_ms } => {
            let kind = ActionKind::HttpFetch {
                url: url.clone(),
                method: method.clone(),
                headers: headers.clone(),
                body: body.clone(),
                timeout_ms: *timeout_ms,
            };
            match http_fetch::execute(&kind, &context.variables, &executor.security).await {
                Ok(output) => {
                    context.metadata.insert("last_rule_http_call".to_string(), json!(output));
                }
                Err(err) => {
                    context
                        .metadata
                        .insert("last_rule_http_call_error".to_string(), json!(err.to_string()));
                }
            }
            Signal::Continue
        }
        RuleAction::Transform { transform_type, source, target } => {
            let resolved = template::resolve_path(&context.variables, source).cloned().unwrap_or(Value::Null);
            let transformed = transform_type.apply(&resolved);
            context.variables.insert(target.clone(), transformed);
            Signal::Continue
        }
    }
}

fn duration_since(result: &ActionResult) -> Option<u64> {
    let end = result.end_time?;
    Some((end - result.start_time).num_milliseconds().max(0) as u64)
}

fn append_log(context: &mut ExecutionContext, step: u32, action: &Action, status: &str, message: Option<String>) {
    let level = if status == "failed" { LogLevel::Error } else { LogLevel::Info };
    let message = message.unwrap_or_else(|| format!("action '{}' {}", action.name, status));
    let log = ExecutionLog::new(
        level,
        step,
        action.name.clone(),
        action.kind.name(),
        message,
        Some(action_params(&action.kind)),
        status,
        None,
    );
    context.logs.push(log);
}

fn action_params(kind: &ActionKind) -> HashMap<String, Value> {
    match serde_json::to_value(kind) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

fn record_failure(context: &mut ExecutionContext, action: &Action, step: u32, err: &MovaError) {
    let mut result = ActionResult::new(&action.name);
    result.error = Some(err.to_string());
    result.finish(ActionStatus::Failed);
    context.results.insert(action.name.clone(), result);
    append_log(context, step, action, "failed", Some(err.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{Budget, BudgetScope, TimeWindow};
    use crate::context::RunStatus;
    use crate::envelope::{ActionRetryOverride, Intent};
    use crate::rules::{Rule, RuleCondition};
    use crate::rules::operators::Operator;
    use serde_json::json;
    use std::time::Duration;

    fn envelope(actions: Vec<Action>) -> Envelope {
        Envelope {
            version: "1".to_string(),
            intent: Intent {
                name: "wf".to_string(),
                version: "1".to_string(),
                description: None,
                tags: vec![],
                timeout: Duration::from_secs(5),
                default_retry_profile: None,
                default_budget: None,
            },
            payload: HashMap::from([("name".to_string(), json!("World"))]),
            actions,
            variables: HashMap::new(),
            secrets: HashMap::new(),
        }
    }

    fn action(name: &str, kind: ActionKind) -> Action {
        Action { name: name.to_string(), enabled: true, timeout: None, retry_policy: None, kind }
    }

    #[tokio::test]
    async fn scenario_1_set_with_payload_template() {
        let executor = Arc::new(Executor::new());
        let env = envelope(vec![action(
            "greet",
            ActionKind::Set { variable: "g".to_string(), value: json!("Hello, {{payload.name}}!") },
        )]);
        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Completed);
        assert_eq!(context.variables.get("g"), Some(&json!("Hello, World!")));
    }

    #[tokio::test]
    async fn scenario_2_sleep_over_action_timeout_fails_the_run() {
        // No retry_policy override: the default `balanced` profile (6
        // attempts) would spend real backoff time if this were retried, so
        // this only stays under 100ms because invalid-config sleep
        // durations are terminal and never reach the retry loop.
        let executor = Arc::new(Executor::new());
        let mut sleep_action = action("nap", ActionKind::Sleep { seconds: 2.0 });
        sleep_action.timeout = Some(Duration::from_secs(1));
        let env = envelope(vec![sleep_action]);

        let start = tokio::time::Instant::now();
        let context = executor.execute_sync(env).await;
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(context.status, RunStatus::Failed);
        let result = context.results.get("nap").unwrap();
        assert_eq!(result.attempts, 1);
        assert!(result
            .error
            .as_ref()
            .unwrap()
            .contains("sleep duration 2.000000 seconds exceeds timeout 1 seconds"));
    }

    #[tokio::test]
    async fn scenario_3_http_fetch_to_denied_host_fails_the_run() {
        let executor = Arc::new(Executor::new());
        let mut fetch = action(
            "probe",
            ActionKind::HttpFetch {
                url: "http://169.254.169.254/metadata".to_string(),
                method: "GET".to_string(),
                headers: HashMap::new(),
                body: None,
                timeout_ms: 1000,
            },
        );
        fetch.retry_policy = Some(ActionRetryOverride { profile: None, max_attempts: Some(1) });
        let env = envelope(vec![fetch]);
        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Failed);
        let result = context.results.get("probe").unwrap();
        assert_eq!(
            result.error.as_deref(),
            Some("security validation failed: host 169.254.169.254 is explicitly denied")
        );
    }

    #[tokio::test]
    async fn if_action_executes_the_matching_branch() {
        let executor = Arc::new(Executor::new());
        let mut env = envelope(vec![]);
        env.variables.insert("flag".to_string(), json!(true));
        env.actions.push(action(
            "branch",
            ActionKind::If {
                condition: "{{flag}}".to_string(),
                then: vec![action(
                    "mark_then",
                    ActionKind::Set { variable: "branch_taken".to_string(), value: json!("then") },
                )],
                r#else: vec![action(
                    "mark_else",
                    ActionKind::Set { variable: "branch_taken".to_string(), value: json!("else") },
                )],
            },
        ));

        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Completed);
        assert_eq!(context.variables.get("branch_taken"), Some(&json!("then")));
    }

    #[tokio::test]
    async fn repeat_action_runs_the_configured_count() {
        let executor = Arc::new(Executor::new());
        let env = envelope(vec![action(
            "loop",
            ActionKind::Repeat {
                count: Some(3),
                r#while: None,
                body: vec![action(
                    "tick",
                    ActionKind::Log { message: "tick".to_string(), level: "info".to_string() },
                )],
                max_iterations: 1000,
            },
        )]);

        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Completed);
        let result = context.results.get("loop").unwrap();
        assert_eq!(result.output.as_ref().unwrap().get("iterations"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn scenario_6_rule_priority_applies_both_actions_in_order() {
        let rule_a = Rule {
            id: "A".to_string(),
            name: "a".to_string(),
            description: None,
            priority: 100,
            enabled: true,
            conditions: vec![RuleCondition {
                field: "status".to_string(),
                operator: Operator::Eq,
                value: json!("error"),
                negate: false,
            }],
            actions: vec![RuleAction::Log { message: "err".to_string(), level: "error".to_string() }],
        };
        let rule_b = Rule {
            id: "B".to_string(),
            name: "b".to_string(),
            description: None,
            priority: 50,
            enabled: true,
            conditions: vec![RuleCondition {
                field: "status".to_string(),
                operator: Operator::Eq,
                value: json!("error"),
                negate: false,
            }],
            actions: vec![RuleAction::SetVar { variable: "seen".to_string(), value: json!(true) }],
        };

        let executor = Arc::new(Executor::new().with_rules(vec![rule_a, rule_b]));
        let env = envelope(vec![action(
            "set_status",
            ActionKind::Set { variable: "status".to_string(), value: json!("error") },
        )]);

        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Completed);
        assert_eq!(context.variables.get("seen"), Some(&json!(true)));
        assert!(context
            .logs
            .iter()
            .any(|l| matches!(l.level, LogLevel::Error) && l.message == "err"));
    }

    #[tokio::test]
    async fn budget_rejection_fails_the_run_without_retrying() {
        let accountant = BudgetAccountant::new();
        accountant.add(Budget {
            id: "b".to_string(),
            name: "executions".to_string(),
            kind: BudgetKind::Executions,
            scope: BudgetScope::Global,
            scope_id: "global".to_string(),
            max_count: 0,
            time_window: TimeWindow::Minute,
            enabled: true,
        });
        let executor = Arc::new(Executor::new().with_budget(accountant));
        let env = envelope(vec![action(
            "noop",
            ActionKind::Log { message: "hi".to_string(), level: "info".to_string() },
        )]);

        let context = executor.execute_sync(env).await;
        assert_eq!(context.status, RunStatus::Failed);
        let result = context.results.get("noop").unwrap();
        assert!(result.error.as_ref().unwrap().contains("budget exceeded"));
    }
}
