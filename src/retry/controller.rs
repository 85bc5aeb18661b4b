//! The Retry Controller: executes an action handler with bounded attempts,
//! backoff+jitter, and DLQ handoff on exhaustion.
//!
//! Generalizes `retry_executor.rs`'s `execute_with_retry` (retry an async
//! closure) into "retry one `Action` through `actions::dispatch`", adding
//! per-action timeout derivation, the one-time Policy-Engine-driven
//! `max_attempts` extension, and DLQ submission on exhaustion.

use crate::actions;
use crate::cancellation::CancellationToken;
use crate::context::ExecutionContext;
use crate::dlq::{DlqStore, ErrorDetails};
use crate::envelope::{Action, Envelope};
use crate::error::MovaError;
use crate::policy::{ErrorContext, PolicyEngine};
use crate::retry::profile::RetryProfile;
use crate::security::SecurityConfig;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub struct RetryOutcome {
    pub output: HashMap<String, Value>,
    pub attempts: u32,
}

/// Resolves the effective retry profile: action-level override, then
/// envelope-level default, then the engine default.
fn resolve_profile(action: &Action, envelope: &Envelope, engine_default: &RetryProfile) -> RetryProfile {
    if let Some(name) = action.retry_policy.as_ref().and_then(|r| r.profile.as_ref()) {
        if let Some(profile) = RetryProfile::by_name(name) {
            return profile;
        }
    }
    if let Some(name) = &envelope.intent.default_retry_profile {
        if let Some(profile) = RetryProfile::by_name(name) {
            return profile;
        }
    }
    engine_default.clone()
}

/// The action-level explicit cap the Policy Engine's in-flight extension
/// may never exceed (spec.md §9 Open Question 2).
fn explicit_max_attempts_cap(action: &Action) -> Option<u32> {
    action.retry_policy.as_ref().and_then(|r| r.max_attempts)
}

fn error_context(err: &MovaError, action: &Action) -> ErrorContext {
    let http_status = match err {
        MovaError::BadResponse { status, .. } => Some(*status),
        _ => None,
    };
    ErrorContext {
        error_kind: err.kind_name().to_string(),
        http_status,
        error_message: err.to_string(),
        action_kind: action.kind.name().to_string(),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_with_retry(
    cancellation: &CancellationToken,
    context: &mut ExecutionContext,
    envelope: &Envelope,
    action: &Action,
    security: &SecurityConfig,
    engine_default_profile: &RetryProfile,
    policy_engine: Option<&PolicyEngine>,
    dlq: Option<&dyn DlqStore>,
) -> Result<RetryOutcome, MovaError> {
    let profile = resolve_profile(action, envelope, engine_default_profile);
    let explicit_cap = explicit_max_attempts_cap(action);
    let mut max_attempts = profile.max_attempts().min(explicit_cap.unwrap_or(u32::MAX));
    if max_attempts == 0 {
        max_attempts = 1;
    }

    let effective_timeout = [action.timeout, Some(profile.timeout)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(profile.timeout);

    let mut history: Vec<String> = Vec::new();
    let mut attempt = 0u32;
    let mut policy_override_used = false;

    loop {
        attempt += 1;
        if cancellation.is_cancelled() {
            return Err(MovaError::Cancelled);
        }

        let dispatch_fut = actions::dispatch(cancellation, context, action, security);
        let attempt_result = match tokio::time::timeout(effective_timeout, dispatch_fut).await {
            Ok(inner) => inner,
            Err(_) => Err(MovaError::Timeout {
                message: format!(
                    "action '{}' timed out after {}ms",
                    action.name,
                    effective_timeout.as_millis()
                ),
                duration_ms: effective_timeout.as_millis() as u64,
            }),
        };

        match attempt_result {
            Ok(output) => {
                return Ok(RetryOutcome { output, attempts: attempt });
            }
            Err(err) => {
                history.push(err.to_string());

                // Terminal kinds never retry and are never DLQ'd: they did
                // not "exhaust" a retry budget, they were rejected outright.
                if err.is_terminal() {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    if let Some(dlq) = dlq {
                        let failed_action = context
                            .results
                            .get(&action.name)
                            .cloned()
                            .unwrap_or_else(|| crate::context::ActionResult::new(&action.name));
                        let details = ErrorDetails {
                            attempts: attempt,
                            last_error: err.to_string(),
                            error_history: history.clone(),
                            failure_reason: err.kind_name().to_string(),
                            retry_profile_used: "resolved".to_string(),
                            environment_tags: Vec::new(),
                        };
                        match dlq.add(envelope, context, &failed_action, details, None).await {
                            Ok(entry) => tracing::warn!(
                                run_id = %context.run_id,
                                action = %action.name,
                                dlq_id = %entry.id,
                                attempts = attempt,
                                "retry attempts exhausted, action handed to DLQ"
                            ),
                            Err(dlq_err) => tracing::error!(
                                run_id = %context.run_id,
                                action = %action.name,
                                error = %dlq_err,
                                "failed to write DLQ entry after retry exhaustion"
                            ),
                        }
                    }
                    return Err(MovaError::RetryExhausted { attempts: attempt });
                }

                // One-time policy-driven max_attempts extension, bounded by
                // any explicit action-level cap.
                if !policy_override_used {
                    if let Some(engine) = policy_engine {
                        let ectx = error_context(&err, action);
                        if let Some(matched) = engine.match_error(&ectx) {
                            if let Some(new_profile) = RetryProfile::by_name(&matched.policy.retry_profile) {
                                let candidate = new_profile.max_attempts().min(explicit_cap.unwrap_or(u32::MAX));
                                if candidate > max_attempts {
                                    max_attempts = candidate;
                                }
                            }
                            policy_override_used = true;
                        }
                    }
                }

                let delay = profile.delay_with_jitter(attempt);
                tracing::debug!(
                    run_id = %context.run_id,
                    action = %action.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying action after backoff"
                );
                let cancelled = cancellation.sleep(delay).await;
                if cancelled {
                    return Err(MovaError::Cancelled);
                }
            }
        }
    }
}

pub fn max_delay_for_profile(profile: &RetryProfile) -> Duration {
    profile.max_delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::envelope::{ActionKind, Intent};
    use std::collections::HashMap as Map;

    fn envelope_with(action: Action) -> Envelope {
        Envelope {
            version: "1".to_string(),
            intent: Intent {
                name: "wf".to_string(),
                version: "1".to_string(),
                description: None,
                tags: vec![],
                timeout: Duration::from_secs(60),
                default_retry_profile: None,
                default_budget: None,
            },
            payload: Map::new(),
            actions: vec![],
            variables: Map::new(),
            secrets: Map::new(),
        }
        .with_action(action)
    }

    trait WithAction {
        fn with_action(self, action: Action) -> Self;
    }
    impl WithAction for Envelope {
        fn with_action(mut self, action: Action) -> Self {
            self.actions.push(action);
            self
        }
    }

    #[tokio::test]
    async fn invalid_config_is_not_retried() {
        let action = Action {
            name: "s".to_string(),
            enabled: true,
            timeout: None,
            retry_policy: None,
            kind: ActionKind::Log { message: "hi".to_string(), level: "not_a_level".to_string() },
        };
        let envelope = envelope_with(action.clone());
        let mut context = ExecutionContext::new("r1", "wf");
        let security = SecurityConfig::default();
        let profile = RetryProfile::balanced();
        let cancellation = CancellationToken::new();

        let result = execute_with_retry(
            &cancellation,
            &mut context,
            &envelope,
            &action,
            &security,
            &profile,
            None,
            None,
        )
        .await;
        assert!(matches!(result, Err(MovaError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn set_action_succeeds_on_first_attempt() {
        let action = Action {
            name: "s".to_string(),
            enabled: true,
            timeout: None,
            retry_policy: None,
            kind: ActionKind::Set { variable: "g".to_string(), value: serde_json::json!("hi") },
        };
        let envelope = envelope_with(action.clone());
        let mut context = ExecutionContext::new("r1", "wf");
        let security = SecurityConfig::default();
        let profile = RetryProfile::balanced();
        let cancellation = CancellationToken::new();

        let outcome = execute_with_retry(
            &cancellation,
            &mut context,
            &envelope,
            &action,
            &security,
            &profile,
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(outcome.attempts, 1);
    }
}
