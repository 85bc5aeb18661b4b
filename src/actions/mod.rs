//! Built-in action handlers. All share the signature
//! `(cancellation, context, action) -> ActionResult` (spec.md §4.7); the
//! control-flow kinds (`if`/`repeat`) are orchestrated directly by the
//! Executor since they recurse into the same per-action lifecycle rather
//! than doing "work" themselves.

pub mod control_flow;
pub mod http_fetch;
pub mod log;
pub mod parse_json;
pub mod set;
pub mod sleep;
pub mod template;

use crate::cancellation::CancellationToken;
use crate::context::ExecutionContext;
use crate::envelope::{Action, ActionKind};
use crate::error::MovaError;
use crate::security::SecurityConfig;
use serde_json::Value;
use std::collections::HashMap;

/// Dispatches a single leaf action kind. Config validation failures are
/// returned as `MovaError::InvalidConfig` and consume no retry attempt
/// (the caller, `retry::controller`, special-cases this).
pub async fn dispatch(
    cancellation: &CancellationToken,
    context: &mut ExecutionContext,
    action: &Action,
    security: &SecurityConfig,
) -> Result<HashMap<String, Value>, MovaError> {
    match &action.kind {
        ActionKind::HttpFetch { .. } => {
            http_fetch::execute(&action.kind, &context.variables, security).await
        }
        ActionKind::ParseJson { .. } => parse_json::execute(&action.kind, context),
        ActionKind::Set { .. } => set::execute(&action.kind, &mut context.variables),
        ActionKind::Sleep { .. } => sleep::execute(cancellation, &action.kind, action.timeout).await,
        ActionKind::Log { .. } => log::execute(&action.kind),
        ActionKind::If { .. } | ActionKind::Repeat { .. } => Err(MovaError::Internal {
            message: "control-flow actions are dispatched by the Executor, not actions::dispatch"
                .to_string(),
        }),
    }
}

pub fn is_control_flow(kind: &ActionKind) -> bool {
    matches!(kind, ActionKind::If { .. } | ActionKind::Repeat { .. })
}
